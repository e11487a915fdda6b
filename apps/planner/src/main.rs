use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use board_core::{
    BoardPresenter, BoardState, ConcurrencyGate, FilterModel, Key, MemoryViewTree, PointInput,
};
use clap::Parser;
use shared::protocol::{FilterKey, SortKey, UpdateSignal};
use storage::{InMemoryPointStore, Snapshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

/// Drives the route board through a scripted session and prints the board after each step.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "planner.toml")]
    config: PathBuf,
    /// JSON snapshot to load instead of the built-in demo trip.
    #[arg(long)]
    seed: Option<PathBuf>,
    #[arg(long)]
    fail_mutations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = load_settings(&args.config)
        .with_context(|| format!("failed to load settings from '{}'", args.config.display()))?;
    if let Some(seed) = args.seed {
        settings.seed_path = Some(seed);
    }
    if args.fail_mutations {
        settings.fail_mutations = true;
    }
    info!(?settings, "planner: settings loaded");

    let store = Arc::new(InMemoryPointStore::new(settings.store_options()));
    let filter = FilterModel::default();
    let mut board = BoardPresenter::new(store.clone(), filter.clone(), MemoryViewTree::new())
        .with_gate(ConcurrencyGate::new(settings.gate_timings()))
        .on_creation_closed(|| info!("planner: creation form closed"));
    board.init();
    print_board("start", &board);

    let seed_path = settings.seed_path.clone();
    store
        .init(async move {
            match seed_path {
                Some(path) => Snapshot::load(&path),
                None => Snapshot::builtin(),
            }
        })
        .await;
    board.process_pending_updates();
    print_board("loaded", &board);
    if board.state() != BoardState::Loaded {
        warn!("planner: nothing to do without route points");
        return Ok(());
    }

    board.change_sort(SortKey::Price);
    print_board("sorted by price", &board);

    let Some(first) = board.visible_points().first().map(|point| point.id) else {
        return Ok(());
    };

    board
        .handle_point_input(first, PointInput::FavoriteClicked)
        .await;
    print_board("favorite toggled", &board);

    board
        .handle_point_input(first, PointInput::UnrollClicked)
        .await;
    let draft = board
        .presenter(first)
        .and_then(|presenter| presenter.form_state())
        .map(|state| state.draft.clone());
    if let Some(mut draft) = draft {
        draft.base_price += 10;
        board
            .handle_point_input(first, PointInput::FormEdited(draft))
            .await;
    }
    print_board("editing", &board);

    board
        .handle_point_input(first, PointInput::FormSubmitted)
        .await;
    print_board("submitted", &board);

    board.create_point();
    print_board("new event", &board);

    board.handle_key(Key::Escape).await;
    print_board("new event cancelled", &board);

    filter.set_filter(UpdateSignal::Minor, FilterKey::Future);
    board.process_pending_updates();
    print_board("future only", &board);

    info!(cycles = board.gate().cycles(), "planner: session finished");
    Ok(())
}

fn print_board(step: &str, board: &BoardPresenter<MemoryViewTree>) {
    println!("== {step} ==");
    for line in board.tree().render_lines() {
        println!("  {line}");
    }
}
