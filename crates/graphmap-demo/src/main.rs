//! CLI entry point for the graphmap demonstration driver.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use graphmap_core::{Edge, EntityType, Node, Registry, Settings};
use graphmap_graph::Graph;

#[derive(Parser)]
#[command(name = "graphmap-demo")]
#[command(about = "Replay small user graphs through graphmap")]
struct Cli {
    /// Config file prefix (default: graphmap).
    #[arg(short, long, default_value = "graphmap")]
    config: String,

    /// Connection URI, overriding the config file and environment.
    #[arg(short, long)]
    uri: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `count` pairs of users that met, in one transaction.
    Meet {
        #[arg(short, long, default_value_t = 500)]
        count: usize,
    },
    /// Save users one by one, then recover them by identity.
    Recover {
        #[arg(short, long, default_value_t = 20)]
        count: usize,
    },
    /// Print the user with the given name.
    Find { name: String },
    /// Delete every node and edge.
    Truncate,
}

struct Schema {
    registry: Registry,
    user: Arc<EntityType>,
    meet: Arc<EntityType>,
}

fn schema() -> anyhow::Result<Schema> {
    let registry = Registry::new();
    let user = EntityType::node("UserNode")
        .attribute("name")
        .key("name")
        .register(&registry)?;
    let meet = EntityType::edge("MeetEdge").register(&registry)?;
    Ok(Schema {
        registry,
        user,
        meet,
    })
}

fn user(ty: &Arc<EntityType>, name: &str) -> anyhow::Result<Node> {
    Ok(Node::builder(ty).attribute("name", name).build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let mut settings = Settings::load(&cli.config)?;
    if let Some(uri) = &cli.uri {
        settings.uri = uri.clone();
    }

    let schema = schema()?;
    let mut graph = Graph::connect(&settings, &schema.registry).await?;
    tracing::info!(uri = %settings.uri, "Connected");

    match cli.command {
        Command::Meet { count } => run_meet(&mut graph, &schema, count).await?,
        Command::Recover { count } => run_recover(&mut graph, &schema, count).await?,
        Command::Find { name } => {
            let found = graph
                .fetch_one(&schema.user, &serde_json::json!({ "name": name }))
                .await?;
            match found {
                Some(node) => println!(
                    "{} {}",
                    node.identity().unwrap_or("-"),
                    node.attribute("name").map(|v| v.to_string()).unwrap_or_default()
                ),
                None => println!("no user named {name}"),
            }
        }
        Command::Truncate => graph.truncate().await?,
    }

    Ok(())
}

async fn run_meet(graph: &mut Graph, schema: &Schema, count: usize) -> anyhow::Result<()> {
    graph.truncate().await?;

    let mut tx = graph.transaction();
    for n in 0..count {
        let mut u = user(&schema.user, &format!("UName-{n}"))?;
        let mut d = user(&schema.user, &format!("DName-{n}"))?;
        let meet = Edge::new(&schema.meet, &mut u, &mut d)?;
        tx.add(u)?;
        tx.add(d)?;
        tx.add(meet)?;
    }
    let summary = tx.commit().await?;
    drop(tx);

    tracing::info!(
        windows = summary.windows,
        nodes = summary.nodes,
        duplicates = summary.duplicates,
        edges = summary.edges,
        statements = summary.statements,
        "Meet graph written"
    );

    let pairs = graph
        .raw_query_as(
            "MATCH (u1:User)-[:Meet]->(u2:User) RETURN u1, u2 LIMIT 5",
            &[("u1", Arc::clone(&schema.user)), ("u2", Arc::clone(&schema.user))],
        )
        .await?;
    for pair in &pairs {
        let names: Vec<String> = pair
            .iter()
            .map(|n| n.attribute("name").map(|v| v.to_string()).unwrap_or_default())
            .collect();
        println!("{} met {}", names[0], names[1]);
    }
    Ok(())
}

async fn run_recover(graph: &mut Graph, schema: &Schema, count: usize) -> anyhow::Result<()> {
    graph.truncate().await?;

    let mut identities = Vec::with_capacity(count);
    for n in 0..count {
        let mut u1 = user(&schema.user, &format!("UName-{n}"))?;
        let mut u2 = user(&schema.user, &format!("UName-two{n}"))?;
        graph.save(&mut u1).await?;
        graph.save(&mut u2).await?;

        let mut meet = Edge::new(&schema.meet, &mut u1, &mut u2)?;
        graph.save(&mut meet).await?;

        if let Some(identity) = u1.identity() {
            identities.push(identity.to_string());
        }
    }

    for identity in &identities {
        let Some(mut node) = graph.get_node_by_id(&schema.user, identity).await? else {
            tracing::warn!(identity = %identity, "Saved user not found");
            continue;
        };
        node.set_property("recovered", true);
        graph.update(&mut node).await?;
    }

    let again = graph.get_or_create(user(&schema.user, "UName-0")?).await?;
    tracing::info!(
        recovered = identities.len(),
        identity = again.identity().unwrap_or("-"),
        "Users recovered"
    );
    Ok(())
}
