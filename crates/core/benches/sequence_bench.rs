//! Criterion benchmarks for frame sequences.
//!
//! Uses synthetic in-memory trajectories so that only indexing, subset
//! refresh and alignment are measured, not disk I/O.
//!
//! Run with: cargo bench -p trajseq-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trajseq_core::trajectory::MemoryTrajectory;
use trajseq_core::{
    Atom, AtomicGroup, AlignedVirtualFrameSequence, FrameSequence, FrameSource, RigidTransform,
    SequenceOptions, VirtualFrameSequence,
};

/// A chain of `n_residues` residues, each N/CA/C/O, laid out along a helix.
fn build_model(n_residues: usize) -> AtomicGroup {
    let mut atoms = Vec::with_capacity(n_residues * 4);
    let mut coords = Vec::with_capacity(n_residues * 4);
    for res in 0..n_residues {
        let t = res as f64 * 1.75;
        let base = [1.1 * t.cos(), 1.1 * t.sin(), 0.15 * res as f64];
        for (a, name) in ["N", "CA", "C", "O"].iter().enumerate() {
            let id = (res * 4 + a + 1) as i64;
            atoms.push(Atom::new(id, *name, "ALA", res as i64 + 1));
            coords.push([base[0] + 0.1 * a as f64, base[1], base[2] + 0.05 * a as f64]);
        }
    }
    AtomicGroup::new(atoms, coords).expect("synthetic model")
}

/// Rigidly moved copies of `model`, one per frame.
fn build_frames(model: &AtomicGroup, n_frames: usize) -> MemoryTrajectory {
    let frames: Vec<AtomicGroup> = (0..n_frames)
        .map(|k| {
            let mut g = model.clone();
            let shift = RigidTransform::from_translation([0.1 * k as f64, -0.05 * k as f64, 0.0]);
            g.apply_transform(&RigidTransform::rotation_z(0.01 * k as f64).then(&shift));
            g
        })
        .collect();
    MemoryTrajectory::from_groups(&frames).expect("synthetic frames")
}

fn member(model: &AtomicGroup, n_frames: usize, options: &SequenceOptions) -> FrameSequence {
    let reader = build_frames(model, n_frames);
    FrameSequence::new(Box::new(reader), model.clone(), options).expect("synthetic sequence")
}

fn bench_random_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_access");
    let model = build_model(250);

    for opts in [
        SequenceOptions::default(),
        SequenceOptions::default().subset("name CA"),
    ] {
        let label = opts.subset.clone().unwrap_or_else(|| "all".to_string());
        let mut seq = member(&model, 200, &opts);
        group.bench_function(BenchmarkId::new("read_at", label), |b| {
            b.iter(|| {
                for k in (0..200).rev().step_by(7) {
                    black_box(seq.read_at(black_box(k)).expect("frame"));
                }
            });
        });
    }
    group.finish();
}

fn bench_composed_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("composed_iteration");
    let model = build_model(100);

    for n_members in [1, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("members", n_members),
            &n_members,
            |b, &n_members| {
                b.iter(|| {
                    let members: Vec<Box<dyn FrameSource>> = (0..n_members)
                        .map(|_| {
                            Box::new(member(&model, 50, &SequenceOptions::default()))
                                as Box<dyn FrameSource>
                        })
                        .collect();
                    let mut seq = VirtualFrameSequence::new(members);
                    let mut count = 0;
                    while let Some(frame) = seq.next_frame() {
                        black_box(frame.expect("frame"));
                        count += 1;
                    }
                    count
                });
            },
        );
    }
    group.finish();
}

fn bench_alignment_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("alignment_pass");
    group.sample_size(10);
    let model = build_model(100);

    for n_frames in [50, 200] {
        group.bench_with_input(
            BenchmarkId::new("frames", n_frames),
            &n_frames,
            |b, &n_frames| {
                b.iter(|| {
                    let members: Vec<Box<dyn FrameSource>> = vec![
                        Box::new(member(&model, n_frames / 2, &SequenceOptions::default())),
                        Box::new(member(&model, n_frames / 2, &SequenceOptions::default())),
                    ];
                    let mut seq = AlignedVirtualFrameSequence::new(members);
                    seq.align().expect("alignment");
                    black_box(seq.alignment_stats())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_random_access,
    bench_composed_iteration,
    bench_alignment_pass
);
criterion_main!(benches);
