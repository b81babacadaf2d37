use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    dag::SqliteDag,
    errors::DagError,
    graph::{Edge, Vertex},
    safety::run_safety_checks,
};

const ERR_PREFIX: &str = "cli";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub database: String,
    pub command: String,
    pub args: Vec<String>,
}

impl CommandLineConfig {
    /// Parses `argv`, skipping the program name. The first positional is the command;
    /// the rest, plus pass-through flags, become command arguments.
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let mut database = String::from("memory");
        let mut command: Option<String> = None;
        let mut rest = Vec::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match *arg {
                "--db" | "--database" => {
                    database = iter
                        .next()
                        .ok_or_else(|| "--db requires a value".to_string())?
                        .to_string();
                }
                "--command" => {
                    command = Some(
                        iter.next()
                            .ok_or_else(|| "--command requires a value".to_string())?
                            .to_string(),
                    );
                }
                "--cascade" => rest.push(arg.to_string()),
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag {other}"));
                }
                _ if command.is_none() => command = Some(arg.to_string()),
                _ => rest.push(arg.to_string()),
            }
        }
        Ok(Self {
            database,
            command: command.unwrap_or_else(|| "status".to_string()),
            args: rest,
        })
    }

    pub fn help() -> &'static str {
        "Usage: sqlitedag [--db memory|PATH] <command> [args]\n\
         \n\
         Commands:\n\
         \x20 status                       vertex and edge counts\n\
         \x20 add-vertex                   insert an empty vertex\n\
         \x20 add-edge SRC TGT             insert a validated edge\n\
         \x20 delete-edge ID               remove an edge\n\
         \x20 delete-vertex ID [--cascade] remove a vertex (and its edges with --cascade)\n\
         \x20 edges                        list all edges\n\
         \x20 ancestors|descendants V      transitive vertex closure\n\
         \x20 parents|children V           direct neighbours\n\
         \x20 successors|predecessors E    transitive edge closure\n\
         \x20 check                        audit the stored graph\n"
    }
}

/// Runs one command against `dag` and returns its JSON output line.
pub fn handle_command(dag: &SqliteDag, command: &str, args: &[String]) -> Result<String, DagError> {
    match command {
        "status" => run_status(dag),
        "add-vertex" => {
            let vertex = dag.insert_vertex()?;
            respond(command, "vertex", &Vertex { id: vertex })
        }
        "add-edge" => {
            let source = positional_i64(args, 0, "SRC")?;
            let target = positional_i64(args, 1, "TGT")?;
            respond(command, "edge", &dag.create_edge(source, target)?)
        }
        "delete-edge" => {
            let id = positional_i64(args, 0, "ID")?;
            dag.delete_edge(id)?;
            respond(command, "deleted", &id)
        }
        "delete-vertex" => run_delete_vertex(dag, args),
        "edges" => respond(command, "edges", &dag.edges()?),
        "ancestors" | "descendants" | "parents" | "children" => {
            let vertex = positional_i64(args, 0, "V")?;
            let found = match command {
                "ancestors" => dag.ancestors_of(vertex)?,
                "descendants" => dag.descendants_of(vertex)?,
                "parents" => dag.parents_of(vertex)?,
                _ => dag.children_of(vertex)?,
            };
            let ids: Vec<i64> = found.iter().map(|v| v.id).collect();
            let mut object = header(command);
            object.insert("vertex".into(), json!(vertex));
            object.insert("vertices".into(), json!(ids));
            encode(object)
        }
        "successors" | "predecessors" => {
            let edge = positional_i64(args, 0, "E")?;
            let found: Vec<Edge> = if command == "successors" {
                dag.successors_of(edge)?
            } else {
                dag.predecessors_of(edge)?
            };
            let mut object = header(command);
            object.insert("edge".into(), json!(edge));
            object.insert("edges".into(), to_value(&found)?);
            encode(object)
        }
        "check" => respond(command, "report", &run_safety_checks(dag)?),
        other => Err(invalid(format!("unknown command {other}"))),
    }
}

fn run_status(dag: &SqliteDag) -> Result<String, DagError> {
    let mut object = header("status");
    object.insert("vertices".into(), json!(dag.vertex_count()?));
    object.insert("edges".into(), json!(dag.edge_count()?));
    encode(object)
}

fn run_delete_vertex(dag: &SqliteDag, args: &[String]) -> Result<String, DagError> {
    let id = positional_i64(args, 0, "ID")?;
    let edges_removed = if args.iter().any(|arg| arg == "--cascade") {
        dag.delete_vertex_cascade(id)?
    } else {
        dag.delete_vertex(id)?;
        0
    };
    let mut object = header("delete-vertex");
    object.insert("deleted".into(), json!(id));
    object.insert("edges_removed".into(), json!(edges_removed));
    encode(object)
}

fn positional_i64(args: &[String], index: usize, name: &str) -> Result<i64, DagError> {
    let value = args
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .nth(index)
        .ok_or_else(|| invalid(format!("missing {name}")))?;
    value
        .parse::<i64>()
        .map_err(|_| invalid(format!("{name} expects an integer, got {value}")))
}

fn respond<T: Serialize>(command: &str, key: &str, payload: &T) -> Result<String, DagError> {
    let mut object = header(command);
    object.insert(key.into(), to_value(payload)?);
    encode(object)
}

fn header(command: &str) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("command".into(), Value::String(command.into()));
    object
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, DagError> {
    serde_json::to_value(payload)
        .map_err(|e| invalid(format!("{ERR_PREFIX} serialization failed: {e}")))
}

fn encode(object: Map<String, Value>) -> Result<String, DagError> {
    serde_json::to_string(&Value::Object(object))
        .map_err(|e| invalid(format!("{ERR_PREFIX} serialization failed: {e}")))
}

fn invalid<T: Into<String>>(message: T) -> DagError {
    DagError::invalid_input(message.into())
}
