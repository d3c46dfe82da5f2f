use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

use std::hint::black_box;
use std::sync::Arc;

use rilldb::common::types::PageId;
use rilldb::storage::buffer::{BufferPoolManager, ParallelBufferPoolManager};
use rilldb::storage::disk::DiskManager;
use rilldb::storage::wal::LogManager;

fn scratch_disk() -> Arc<DiskManager> {
    let file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(file.path()).unwrap());
    // The pool outlives this function; leak the handle so the file does too
    std::mem::forget(file);
    disk_manager
}

/// Allocate `page_count` pages, stamp each one, and leave them all unpinned
/// and flushed so the benchmark loop starts from a clean pool
fn populate(pool: &BufferPoolManager, page_count: usize) -> Vec<PageId> {
    let mut page_ids = Vec::with_capacity(page_count);
    for i in 0..page_count {
        let (page, page_id) = pool.new_page().unwrap().expect("nothing stays pinned");
        {
            let mut guard = page.write();
            guard.data[0] = (i % 251) as u8;
        }
        pool.unpin_page(page_id, true);
        page_ids.push(page_id);
    }
    pool.flush_all_pages().unwrap();
    page_ids
}

/// Page-table hits only: the working set fits the pool exactly
fn resident_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("resident_fetch");
    for &pool_size in &[64usize, 512] {
        group.bench_with_input(
            BenchmarkId::from_parameter(pool_size),
            &pool_size,
            |b, &pool_size| {
                let pool = BufferPoolManager::new(pool_size, scratch_disk(), None);
                let page_ids = populate(&pool, pool_size);

                b.iter(|| {
                    for &page_id in &page_ids {
                        let page = pool.fetch_page(page_id).unwrap().unwrap();
                        black_box(page.read().data[0]);
                        pool.unpin_page(page_id, false);
                    }
                });
            },
        );
    }
    group.finish();
}

/// A working set eight times the pool keeps the clock hand moving: most
/// fetches evict, and a third of them leave a dirty victim to write back
fn eviction_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_churn");
    group.bench_function("random_reads_dirty_victims", |b| {
        let pool = BufferPoolManager::new(64, scratch_disk(), None);
        let page_ids = populate(&pool, 512);
        let mut rng = StdRng::seed_from_u64(7);

        b.iter(|| {
            let page_id = page_ids[rng.gen_range(0..page_ids.len())];
            let page = pool.fetch_page(page_id).unwrap().unwrap();
            let dirty = rng.gen_ratio(1, 3);
            if dirty {
                let mut guard = page.write();
                guard.data[8] = guard.data[8].wrapping_add(1);
            } else {
                black_box(page.read().data[8]);
            }
            pool.unpin_page(page_id, dirty);
        });
    });
    group.finish();
}

/// The same resident workload through one instance and through four striped
/// instances, to show what the mod-N fan-out costs
fn striped_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("striped_fetch");
    for &num_instances in &[1usize, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_instances),
            &num_instances,
            |b, &num_instances| {
                let pool =
                    ParallelBufferPoolManager::new(num_instances, 256 / num_instances, scratch_disk(), None);

                // The round-robin allocator spreads these evenly, so every
                // stripe ends up exactly full and every fetch below is a hit
                let mut page_ids = Vec::new();
                for _ in 0..256 {
                    let (_, page_id) = pool.new_page().unwrap().expect("nothing stays pinned");
                    pool.unpin_page(page_id, false);
                    page_ids.push(page_id);
                }

                b.iter(|| {
                    for &page_id in &page_ids {
                        let page = pool.fetch_page(page_id).unwrap().unwrap();
                        black_box(page.read().page_id);
                        pool.unpin_page(page_id, false);
                    }
                });
            },
        );
    }
    group.finish();
}

/// Two dirty pages ping-ponging through a single frame: every fetch evicts
/// the other page, forcing the log up to its LSN and then the page write
fn wal_forced_writeback(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_writeback");
    group.bench_function("dirty_ping_pong", |b| {
        let log_file = NamedTempFile::new().unwrap();
        let log_manager = Arc::new(LogManager::new(log_file.path()).unwrap());
        std::mem::forget(log_file);

        let pool = BufferPoolManager::new(1, scratch_disk(), Some(log_manager.clone()));
        let page_ids = populate(&pool, 2);

        let mut turn = 0usize;
        b.iter(|| {
            let page_id = page_ids[turn % 2];
            turn += 1;
            let page = pool.fetch_page(page_id).unwrap().unwrap();
            {
                let mut guard = page.write();
                guard.data[0] = guard.data[0].wrapping_add(1);
                guard.lsn = log_manager.append(b"bump");
            }
            pool.unpin_page(page_id, true);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    resident_fetch,
    eviction_churn,
    striped_fan_out,
    wal_forced_writeback
);
criterion_main!(benches);
