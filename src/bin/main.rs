//! Replays inserts, searches and deletes against one engine and prints what each step did.

use clap::{Parser, ValueEnum};
use steptree::{
    AvlTree, BTree, RedBlackTree, SearchTree, SplayTree, Trace, TreeConfig, TwoThreeTree,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    Avl,
    RedBlack,
    Splay,
    TwoThree,
    Btree,
}

#[derive(Parser, Debug)]
#[command(name = "steptree")]
#[command(about = "Step through self-balancing search tree operations")]
#[command(version)]
struct Args {
    /// Engine to drive
    #[arg(value_enum)]
    engine: Engine,

    /// Keys to insert, in order
    #[arg(short, long, value_delimiter = ',')]
    insert: Vec<u32>,

    /// Keys to search for once every insert ran
    #[arg(short, long, value_delimiter = ',')]
    search: Vec<u32>,

    /// Keys to delete once every search ran
    #[arg(short, long, value_delimiter = ',')]
    delete: Vec<u32>,

    /// B-tree minimum degree
    #[arg(long, default_value_t = 2)]
    degree: usize,

    /// Maximum number of keys
    #[arg(long)]
    capacity: Option<usize>,

    /// Skip hierarchy frames in the printed traces
    #[arg(long)]
    no_frames: bool,

    /// Print traces as JSON
    #[arg(long)]
    json: bool,

    /// Print the final tree as a Graphviz digraph
    #[arg(long)]
    dot: bool,

    /// Enable debug logging
    #[arg(long, env = "STEPTREE_DEBUG")]
    debug: bool,
}

impl Args {
    fn config(&self) -> TreeConfig {
        let mut config = TreeConfig::default()
            .with_min_degree(self.degree)
            .with_frames(!self.no_frames);
        if let Some(capacity) = self.capacity {
            config = config.with_capacity(capacity);
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("steptree={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.config();
    tracing::info!(engine = ?args.engine, ?config, "replaying");

    match args.engine {
        Engine::Avl => replay(AvlTree::with_config(config), &args),
        Engine::RedBlack => replay(RedBlackTree::with_config(config), &args),
        Engine::Splay => replay(SplayTree::with_config(config), &args),
        Engine::TwoThree => replay(TwoThreeTree::with_config(config), &args),
        Engine::Btree => replay(BTree::<u32>::with_config(config)?, &args),
    }
}

fn replay<T: SearchTree<Key = u32>>(mut tree: T, args: &Args) -> anyhow::Result<()> {
    for &key in &args.insert {
        match tree.insert(key) {
            Ok(inserted) => tracing::info!(key, id = %inserted.id, created = inserted.created, "insert"),
            Err(error) => tracing::warn!(key, %error, "insert rejected"),
        }
        print_trace("insert", key, &tree.take_trace(), args.json)?;
    }

    for &key in &args.search {
        let search = tree.search(&key);
        tracing::info!(key, found = search.found, path = ?search.path, "search");
        print_trace("search", key, &tree.take_trace(), args.json)?;
    }

    for &key in &args.delete {
        match tree.delete(&key) {
            Ok(removed) => tracing::info!(key, removed = %removed.removed, "delete"),
            Err(error) => tracing::warn!(key, %error, "delete rejected"),
        }
        print_trace("delete", key, &tree.take_trace(), args.json)?;
    }

    tree.validate()?;
    println!("keys: {:?}", tree.keys());

    if args.dot {
        let mut out = String::new();
        tree.hierarchy().dotgraph("steptree", &mut out)?;
        println!("{out}");
    }

    Ok(())
}

fn print_trace(op: &str, key: u32, trace: &Trace<u32>, json: bool) -> anyhow::Result<()> {
    if json {
        let line = serde_json::json!({ "op": op, "key": key, "trace": trace });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    println!("{op} {key}: {} event(s)", trace.len());
    for event in trace.events() {
        println!("  {event:?}");
    }
    Ok(())
}
