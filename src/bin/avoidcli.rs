//! Demo CLI: load a scene and a parameter file, route every connector once,
//! and print (or write) the resulting routes.
//!
//! Subcommand/argument shape follows `examples/WFBFA-SNOMOR/Paths/src/main.rs`
//! 1:1 in spirit: `clap::App`/`SubCommand` with positional, index-based
//! arguments, `env_logger::init_from_env`, and `serde_json`/`serde_yaml` for
//! the two input files. Where the teacher has subcommands per problem
//! (`fly`, `plow`, `geojson`), this has subcommands per host-visible
//! operation (`route`, `validate`).

use std::fs::File;
use std::io;

use clap::{crate_version, App, Arg, SubCommand};

use linerouter::{
    ConnDirFlags, ConnEnd, ConnType, PenaltyConfig, Polygon, Pt, Router, RouterOptions,
};

#[derive(serde::Deserialize)]
struct ShapeSpec {
    points: Vec<Pt>,
}

#[derive(serde::Deserialize)]
struct ClusterSpec {
    name: String,
    points: Vec<Pt>,
}

#[derive(serde::Deserialize)]
struct ConnectorSpec {
    #[serde(default = "default_kind")]
    kind: String,
    source: Pt,
    target: Pt,
    #[serde(default)]
    source_directions: Option<ConnDirFlags>,
    #[serde(default)]
    target_directions: Option<ConnDirFlags>,
    #[serde(default)]
    hate_crossings: bool,
}

fn default_kind() -> String {
    "polyline".to_string()
}

#[derive(serde::Deserialize, Default)]
struct Scene {
    #[serde(default)]
    shapes: Vec<ShapeSpec>,
    #[serde(default)]
    clusters: Vec<ClusterSpec>,
    #[serde(default)]
    connectors: Vec<ConnectorSpec>,
}

#[derive(serde::Deserialize)]
struct ParamsFile {
    #[serde(default)]
    options: RouterOptions,
    #[serde(default)]
    penalties: PenaltyConfig,
}

#[derive(serde::Serialize)]
struct RouteOutput {
    index: usize,
    route: Vec<Pt>,
    display_route: Vec<Pt>,
    length: f64,
    false_path: bool,
}

fn build_router(scene: Scene, params: ParamsFile) -> Router {
    let mut router = Router::new(params.options).expect("router options must select at least one routing mode");
    router.penalties = params.penalties;

    for shape in scene.shapes {
        router.add_shape(Polygon::new(shape.points));
    }
    for cluster in scene.clusters {
        router.add_cluster(cluster.name, Polygon::new(cluster.points));
    }
    for conn in scene.connectors {
        let conn_type = if conn.kind.eq_ignore_ascii_case("orthogonal") { ConnType::Orthogonal } else { ConnType::PolyLine };
        let source = ConnEnd::with_directions(conn.source, conn.source_directions.unwrap_or(ConnDirFlags::ALL));
        let target = ConnEnd::with_directions(conn.target, conn.target_directions.unwrap_or(ConnDirFlags::ALL));
        let id = router.add_connector(conn_type, source, target);
        if conn.hate_crossings {
            router.set_hate_crossings(id, true);
        }
    }

    router
}

fn routes_of(router: &Router) -> Vec<RouteOutput> {
    router
        .connectors
        .values()
        .enumerate()
        .map(|(index, c)| RouteOutput {
            index,
            route: c.route().to_vec(),
            display_route: c.display_route().to_vec(),
            length: c.route_length,
            false_path: c.false_path,
        })
        .collect()
}

fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));

    let matches = App::new("avoidcli")
        .version(crate_version!())
        .about("Route connectors around obstacles")
        .subcommand(
            SubCommand::with_name("route")
                .about("Load a scene, process one transaction, write the resulting routes")
                .arg(Arg::with_name("scene").takes_value(true).required(true).index(1).help("Scene JSON (shapes/clusters/connectors)"))
                .arg(Arg::with_name("params").takes_value(true).required(true).index(2).help("Router options + penalties YAML"))
                .arg(Arg::with_name("output").takes_value(true).required(true).index(3).help("Output routes JSON")),
        )
        .subcommand(
            SubCommand::with_name("validate")
                .about("Load a scene and parameters, route once, and report counts without writing output")
                .arg(Arg::with_name("scene").takes_value(true).required(true).index(1).help("Scene JSON"))
                .arg(Arg::with_name("params").takes_value(true).required(true).index(2).help("Router options + penalties YAML")),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("route") {
        let scene: Scene = serde_json::from_reader(File::open(matches.value_of("scene").unwrap())?).expect("scene invalid JSON");
        let params: ParamsFile = serde_yaml::from_reader(File::open(matches.value_of("params").unwrap())?).expect("params invalid YAML");
        log::info!("loaded scene: {} shapes, {} clusters, {} connectors", scene.shapes.len(), scene.clusters.len(), scene.connectors.len());

        let mut router = build_router(scene, params);
        router.process_transaction();
        log::info!("routed {} connectors", router.connectors.len());

        let out = routes_of(&router);
        serde_json::to_writer_pretty(File::create(matches.value_of("output").unwrap())?, &out).unwrap();
    } else if let Some(matches) = matches.subcommand_matches("validate") {
        let scene: Scene = serde_json::from_reader(File::open(matches.value_of("scene").unwrap())?).expect("scene invalid JSON");
        let params: ParamsFile = serde_yaml::from_reader(File::open(matches.value_of("params").unwrap())?).expect("params invalid YAML");
        let shape_count = scene.shapes.len();
        let connector_count = scene.connectors.len();

        let mut router = build_router(scene, params);
        router.process_transaction();
        let false_paths = router.connectors.values().filter(|c| c.false_path).count();
        log::info!(
            "{} shapes, {} connectors routed, {} degraded to a straight fallback",
            shape_count,
            connector_count,
            false_paths
        );
    }

    Ok(())
}
