//! Incremental, object-avoiding poly-line and orthogonal connector router.
//!
//! Maintains a visibility graph over a mutable scene of polygonal shapes and
//! produces, for each connector, a shortest path between its two endpoints
//! that avoids the shapes currently in the scene. Updates are incremental:
//! adding, moving, or removing a shape patches the graph in place rather than
//! rebuilding it, and only connectors whose routes can demonstrably be
//! improved are rerouted (see [`router::Router::process_transaction`]).
//!
//! Module layout mirrors the subsystem breakdown: geometry and polygon
//! primitives at the bottom, the vertex/edge arenas above those, then the two
//! visibility builders (poly-line and orthogonal), the path search, the
//! crossing analysis, and finally [`router::Router`] tying everything
//! together.

pub mod config;
pub mod connector;
pub mod crossing;
pub mod edge;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod orthogonal;
pub mod polygon;
pub mod router;
pub mod search;
pub mod shape;
pub mod vertex;
pub mod visibility;

pub use config::{PenaltyConfig, RouterOptions, RoutingType, Timers};
pub use connector::{ConnEnd, ConnRef, ConnType, ConnectorMap, EndSelector};
pub use error::{Result, RouterError};
pub use geometry::{BBox, Blocker, Dir, Pt};
pub use ids::{ClusterId, ConnectorId, EdgeId, ShapeId, VertexId};
pub use polygon::{CurvedPolyline, PathOp, Polygon};
pub use router::Router;
pub use shape::{ClusterMap, ClusterRef, ShapeMap, ShapeRef};
pub use vertex::ConnDirFlags;
