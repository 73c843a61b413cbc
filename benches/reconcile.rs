//! Reconciliation Benchmarks
//!
//! Measures the diff between display sets and a full hardware-event pass
//! (registry merge, topology, layout, diff, notification) for growing
//! numbers of displays.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lamco_display_topology::display::{
    reconcile, DisplayManager, DisplayManagerOptions, LogicalDisplay, PhysicalDisplayRecord, Rect,
};

/// A row of displays, each 1920 wide, shifted down by `dy`
fn logical_row(count: usize, dy: i32) -> Vec<LogicalDisplay> {
    (0..count)
        .map(|i| {
            let mut display = LogicalDisplay::new(i as i64 + 1);
            display.set_scale_and_bounds(1.0, Rect::new(i as i32 * 1920, dy, 1920, 1080));
            display
        })
        .collect()
}

fn native_row(count: usize) -> Vec<PhysicalDisplayRecord> {
    (0..count)
        .map(|i| {
            let id = i as i64 + 1;
            let mut record = PhysicalDisplayRecord::new(id, format!("Panel {}", id), false);
            record.set_bounds(Rect::new(i as i32 * 1920, 0, 1920, 1080));
            record.is_native = true;
            record
        })
        .collect()
}

/// Diff of identical sets (steady state - nothing changed)
fn bench_reconcile_unchanged(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_unchanged");

    for count in [1, 2, 4, 8] {
        let displays = logical_row(count, 0);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("displays", count), &displays, |b, set| {
            b.iter(|| black_box(reconcile(black_box(set), black_box(set))))
        });
    }

    group.finish();
}

/// Diff where every display moved
fn bench_reconcile_all_moved(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_all_moved");

    for count in [1, 2, 4, 8] {
        let old = logical_row(count, 0);
        let new = logical_row(count, 100);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(BenchmarkId::new("displays", count), |b| {
            b.iter(|| {
                let result = reconcile(black_box(&old), black_box(&new));
                black_box(result.events(&new))
            })
        });
    }

    group.finish();
}

/// Full hardware pass alternating between one panel and `count` panels
fn bench_hotplug_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("hotplug_pass");

    for count in [2, 4, 8] {
        group.bench_function(BenchmarkId::new("displays", count), |b| {
            let mut manager = DisplayManager::new(DisplayManagerOptions::default());
            let single = native_row(1);
            let all = native_row(count);

            b.iter(|| {
                let _ = manager.on_native_displays_changed(black_box(all.clone()));
                let _ = manager.on_native_displays_changed(black_box(single.clone()));
            })
        });
    }

    group.finish();
}

/// Unified desktop pass over mixed panel heights
fn bench_unified_pass(c: &mut Criterion) {
    c.bench_function("unified_pass", |b| {
        let mut manager = DisplayManager::new(DisplayManagerOptions {
            unified_desktop_enabled: true,
            ..Default::default()
        });
        let mut panels = native_row(3);
        panels[1].set_bounds(Rect::new(1920, 0, 1280, 1024));

        b.iter(|| {
            let _ = manager.on_native_displays_changed(black_box(panels.clone()));
            let _ = manager.reconfigure_displays();
        })
    });
}

criterion_group!(
    benches,
    bench_reconcile_unchanged,
    bench_reconcile_all_moved,
    bench_hotplug_pass,
    bench_unified_pass
);
criterion_main!(benches);
