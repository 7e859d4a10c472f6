//! Generational handles into the router's arenas.
//!
//! DESIGN NOTES (spec.md §9) calls for `(arena, index, generation)` handles
//! instead of the source's raw pointers; `slotmap` gives us exactly that,
//! with O(1) "mark slot free, bump generation" deletion.

use slotmap::new_key_type;

new_key_type! {
    /// A vertex in the router's vertex sequence (connector endpoint, shape
    /// corner, or dummy orthogonal vertex).
    pub struct VertexId;

    /// An edge in one of the three edge lists (visibility, invisibility,
    /// orthogonal-visibility).
    pub struct EdgeId;

    /// A shape reference.
    pub struct ShapeId;

    /// A cluster reference.
    pub struct ClusterId;

    /// A connector reference.
    pub struct ConnectorId;
}
