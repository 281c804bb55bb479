//! Integration tests for gridlife
//!
//! These tests run the full engine (coordinator, workers, channel fabric) and
//! check its results against a plain single-threaded reference step.

use std::sync::Arc;
use std::time::Duration;

use gridlife::channel::{Endpoint, MessageChannel, Payload};
use gridlife::config::Config;
use gridlife::events::EngineEvent;
use gridlife::{
    Cell, Coordinator, Engine, EngineError, EventBus, ExchangeError, Grid, HaloDirection,
    LocalFabric, PartitionPlan, PartitionWorker, Pattern, PayloadKind, Phase, ProtocolError,
    WorkerContext,
};

// =============================================================================
// Reference implementation
// =============================================================================

/// One whole-grid update with no partitioning, used as ground truth
fn reference_step(grid: &Grid) -> Grid {
    let mut next = Grid::new(grid.height(), grid.width());
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let mut neighbours = 0u8;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 {
                        continue;
                    }
                    if let Some(cell) = grid.get(nx as usize, ny as usize) {
                        if cell.is_alive() {
                            neighbours += 1;
                        }
                    }
                }
            }
            let cell = grid.get(x, y).unwrap();
            let updated = if neighbours == 3 {
                Cell::Alive
            } else if neighbours > 3 || neighbours < 2 {
                Cell::Dead
            } else {
                cell
            };
            next.set_cell(x, y, updated);
        }
    }
    next
}

fn run_config(grid_size: usize, workers: usize, generations: u64) -> Config {
    Config {
        grid_size,
        worker_count: workers,
        generations,
        pattern: Pattern::Random,
        density: 0.35,
        seed: Some(1234),
        phase_timeout_ms: 10_000,
        ..Config::default()
    }
}

async fn run_to_completion(config: &Config) -> Grid {
    let handle = Engine::spawn(config).expect("engine should spawn");
    handle.wait().await.expect("run should complete")
}

// =============================================================================
// Distributed vs reference equivalence
// =============================================================================

#[tokio::test]
async fn test_engine_matches_reference_step() {
    let config = run_config(21, 3, 8);

    let mut expected = Grid::square(config.grid_size);
    gridlife::patterns::seed(&mut expected, config.pattern, config.density, config.seed);
    for _ in 0..config.generations {
        expected = reference_step(&expected);
    }

    let actual = run_to_completion(&config).await;
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_worker_count_does_not_change_results() {
    let baseline = run_to_completion(&run_config(21, 1, 6)).await;

    for workers in [2, 3, 7] {
        let distributed = run_to_completion(&run_config(21, workers, 6)).await;
        assert_eq!(distributed, baseline, "diverged with {workers} workers");
    }
}

#[tokio::test]
async fn test_uneven_partition_boundaries() {
    // 10 rows over 4 workers splits 2/2/3/3; halo rows cross every boundary.
    let baseline = run_to_completion(&run_config(10, 1, 5)).await;
    let distributed = run_to_completion(&run_config(10, 4, 5)).await;
    assert_eq!(distributed, baseline);
}

#[tokio::test]
async fn test_blinker_oscillates_through_engine() {
    let config = Config {
        grid_size: 9,
        worker_count: 3,
        generations: 2,
        pattern: Pattern::Blinker,
        ..Config::default()
    };
    let grid = run_to_completion(&config).await;

    // Period two: after an even number of generations the blinker is back in
    // its horizontal phase.
    let mut expected = Grid::square(9);
    gridlife::patterns::seed(&mut expected, Pattern::Blinker, 0.0, None);
    assert_eq!(grid, expected);
}

// =============================================================================
// External control surface
// =============================================================================

#[tokio::test]
async fn test_stop_ends_an_unbounded_run() {
    let config = Config {
        generations: u64::MAX,
        ..run_config(12, 2, 0)
    };
    let handle = Engine::spawn(&config).expect("engine should spawn");
    let mut events = handle.subscribe();

    // Let at least one generation complete before stopping.
    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("a generation should complete")
        .expect("event bus should be open");
    assert!(matches!(event, EngineEvent::GenerationCompleted { .. }));

    handle.stop().await.expect("stop should send");
    let grid = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("run should end after stop")
        .expect("run should succeed");
    assert_eq!(grid.height(), 12);
}

#[tokio::test]
async fn test_pause_freezes_the_grid() {
    let config = Config {
        generations: u64::MAX,
        ..run_config(12, 2, 0)
    };
    let handle = Engine::spawn(&config).expect("engine should spawn");

    handle.set_animating(false).await.unwrap();
    // Commands apply in order, so both snapshots observe the paused grid.
    let first = handle.snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = handle.snapshot().await.unwrap();
    assert_eq!(first, second);

    handle.stop().await.unwrap();
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn test_cell_edits_enter_the_next_generation() {
    let config = Config {
        grid_size: 9,
        worker_count: 3,
        generations: u64::MAX,
        pattern: Pattern::Empty,
        ..Config::default()
    };
    let handle = Engine::spawn(&config).expect("engine should spawn");

    // Paint a blinker onto the running (empty, hence static) grid.
    handle.set_animating(false).await.unwrap();
    for x in 3..=5 {
        handle.set_cell(x, 4, true).await.unwrap();
    }
    handle.set_animating(true).await.unwrap();

    let mut events = handle.subscribe();
    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("a generation should complete")
        .expect("event bus should be open");
    if let EngineEvent::GenerationCompleted { live_cells, .. } = event {
        assert_eq!(live_cells, 3, "a blinker stays at three live cells");
    }

    handle.stop().await.unwrap();
    let grid = handle.wait().await.unwrap();
    assert_eq!(grid.live_cells(), 3);
}

#[tokio::test]
async fn test_out_of_bounds_edit_is_ignored() {
    let config = Config {
        grid_size: 9,
        worker_count: 3,
        generations: 1,
        pattern: Pattern::Empty,
        ..Config::default()
    };
    let handle = Engine::spawn(&config).expect("engine should spawn");
    handle.set_cell(100, 100, true).await.unwrap();

    let grid = handle.wait().await.unwrap();
    assert_eq!(grid.live_cells(), 0);
}

#[tokio::test]
async fn test_coordinator_error_releases_waiting_workers() {
    let plan = PartitionPlan::compute(8, 2).unwrap();
    let (coordinator_channel, mut channels) = LocalFabric::new(2)
        .with_timeout(Some(Duration::from_millis(200)))
        .build();

    let ctx = WorkerContext {
        id: 0,
        total_workers: 2,
    };
    let worker = PartitionWorker::new(ctx, plan.range(0), 8, channels.remove(0));
    let worker_task = tokio::spawn(worker.run());

    // Worker 1 plays the protocol through both barriers, then disappears
    // without ever sending its partition back.
    let mut rogue = channels.remove(0);
    tokio::spawn(async move {
        rogue
            .recv_matching(Endpoint::Coordinator, PayloadKind::Control)
            .await
            .unwrap();
        rogue
            .recv_matching(Endpoint::Coordinator, PayloadKind::Partition)
            .await
            .unwrap();
        rogue
            .recv_matching(Endpoint::Worker(0), PayloadKind::HaloRow(HaloDirection::Down))
            .await
            .unwrap();
        rogue
            .send(
                Endpoint::Worker(0),
                Payload::HaloRow {
                    direction: HaloDirection::Up,
                    cells: vec![Cell::Dead; 8],
                },
            )
            .await
            .unwrap();
        rogue.barrier().await.unwrap();
        rogue.barrier().await.unwrap();
    });

    let (_commands, command_rx) = tokio::sync::mpsc::channel(8);
    let events = Arc::new(EventBus::with_default_capacity());
    let coordinator = Coordinator::new(
        Grid::square(8),
        plan,
        coordinator_channel,
        command_rx,
        events,
        3,
    );

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::CommunicationFailure {
            phase: Phase::Gather,
            ..
        }
    ));

    // The surviving worker must not be left parked waiting for the next
    // generation's control message.
    let result = tokio::time::timeout(Duration::from_secs(2), worker_task)
        .await
        .expect("worker 0 should be released after the coordinator fails")
        .unwrap();
    assert!(result.is_ok());
}

// =============================================================================
// Protocol validation
// =============================================================================

#[tokio::test]
async fn test_gather_rejects_wrong_sized_partition() {
    let plan = PartitionPlan::compute(8, 2).unwrap();
    let (mut coordinator, workers) = LocalFabric::new(2).build();

    for mut worker in workers {
        tokio::spawn(async move {
            // One row short of the planned 4x8 partition.
            worker
                .send(Endpoint::Coordinator, Payload::Partition(vec![Cell::Dead; 24]))
                .await
                .unwrap();
        });
    }

    let mut grid = Grid::square(8);
    let err = coordinator.gather(&mut grid, &plan).await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::PartitionLength { expected: 32, got: 24, .. })
    ));
}

#[tokio::test]
async fn test_scatter_gather_round_trip() {
    let plan = PartitionPlan::compute(9, 3).unwrap();
    let (mut coordinator, workers) = LocalFabric::new(3).build();

    let mut grid = Grid::square(9);
    gridlife::patterns::seed(&mut grid, Pattern::Random, 0.5, Some(9));

    // Echo workers: receive a partition, send it straight back.
    for mut worker in workers {
        tokio::spawn(async move {
            let payload = worker
                .recv_matching(
                    Endpoint::Coordinator,
                    gridlife::PayloadKind::Partition,
                )
                .await
                .unwrap();
            worker.send(Endpoint::Coordinator, payload).await.unwrap();
        });
    }

    coordinator.scatter(&grid, &plan).await.unwrap();
    let mut round_tripped = Grid::square(9);
    coordinator.gather(&mut round_tripped, &plan).await.unwrap();
    assert_eq!(round_tripped, grid);
}
