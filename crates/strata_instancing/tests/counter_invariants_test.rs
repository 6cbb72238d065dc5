//! # Counter Invariant Tests
//!
//! Drives random setter sequences through a model and checks after every
//! step that:
//!
//! 1. Each layer counter equals the number of its portions satisfying the
//!    predicate
//! 2. Each model counter equals the sum over layers
//! 3. The uploaded selector bytes match the portion's current flags
//!
//! Run with: cargo test -p strata_instancing --test counter_invariants_test

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_instancing::{
    encode_pass_selectors, EntityFlags, HostBuffers, InstancedModel, InstancingConfig,
    LayerGeometry, LayerPositions, PortionCounters, PortionDesc, PortionId, Predicate,
};

const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
const LAYERS: usize = 3;
const PORTIONS_PER_LAYER: u32 = 16;
const STEPS: usize = 2_000;

fn build_model(host: &mut HostBuffers) -> InstancedModel {
    let mut model = InstancedModel::new(InstancingConfig::default());
    for _ in 0..LAYERS {
        let layer = model
            .create_layer(host, &LayerGeometry::new(LayerPositions::Float(&TRIANGLE)))
            .unwrap();
        for _ in 0..PORTIONS_PER_LAYER {
            model.create_portion(layer, &PortionDesc::default()).unwrap();
        }
    }
    model.finalize(host);
    model
}

fn random_flags(rng: &mut ChaCha8Rng) -> EntityFlags {
    EntityFlags(rng.gen_range(0..1u32 << 9))
}

fn apply_random_step(rng: &mut ChaCha8Rng, model: &mut InstancedModel, host: &mut HostBuffers) {
    let layer = rng.gen_range(0..LAYERS);
    let portion = PortionId(rng.gen_range(0..PORTIONS_PER_LAYER));
    let on = rng.gen_bool(0.5);

    let result = match rng.gen_range(0..12) {
        0 => {
            let flags = random_flags(rng);
            model.init_flags(host, layer, portion, flags, on)
        }
        1 => model.set_visible(host, layer, portion, on),
        2 => model.set_highlighted(host, layer, portion, on),
        3 => model.set_xrayed(host, layer, portion, on),
        4 => model.set_selected(host, layer, portion, on),
        5 => model.set_edges(host, layer, portion, on),
        6 => model.set_culled(host, layer, portion, on),
        7 => model.set_pickable(host, layer, portion, on),
        8 => model.set_clippable(host, layer, portion, on),
        9 => model.set_collidable(host, layer, portion, on),
        10 => model.set_transparent(host, layer, portion, on),
        _ => model.set_color(host, layer, portion, [rng.gen(), rng.gen(), rng.gen(), 255]),
    };
    result.unwrap();
}

fn check_invariants(model: &InstancedModel, host: &HostBuffers) {
    let mut sum = PortionCounters::new();

    for layer in model.finalized_layers() {
        let mut expected = PortionCounters::new();
        let selectors = host.get(layer.buffers().flags).unwrap().to_vec::<[u8; 4]>();

        for id in 0..layer.num_portions() {
            let state = layer.portion_state(PortionId(id)).unwrap();
            expected.add_portion();
            expected.apply(Default::default(), state);

            // The default state encodes to the zeroed selectors finalize uploads.
            let encoded = encode_pass_selectors(state.flags, state.transparent).to_bytes();
            assert_eq!(selectors[id as usize], encoded, "layer {} portion {id}", layer.index());
        }

        for predicate in Predicate::ALL {
            let direct = (0..layer.num_portions())
                .filter(|&id| predicate.holds(layer.portion_state(PortionId(id)).unwrap()))
                .count() as u32;
            assert_eq!(layer.counters().count(predicate), direct, "{predicate:?}");
        }
        assert_eq!(layer.counters(), &expected);

        sum.portions += expected.portions;
        for predicate in Predicate::ALL {
            let total = sum.count(predicate) + expected.count(predicate);
            set_count(&mut sum, predicate, total);
        }
    }

    assert_eq!(model.counters(), &sum);
}

fn set_count(counters: &mut PortionCounters, predicate: Predicate, value: u32) {
    let slot = match predicate {
        Predicate::Visible => &mut counters.visible,
        Predicate::Transparent => &mut counters.transparent,
        Predicate::XRayed => &mut counters.xrayed,
        Predicate::Highlighted => &mut counters.highlighted,
        Predicate::Selected => &mut counters.selected,
        Predicate::Clippable => &mut counters.clippable,
        Predicate::Edges => &mut counters.edges,
        Predicate::Pickable => &mut counters.pickable,
        Predicate::Culled => &mut counters.culled,
    };
    *slot = value;
}

#[test]
fn random_setters_keep_counters_exact() {
    for seed in [1u64, 7, 42] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut host = HostBuffers::new();
        let mut model = build_model(&mut host);

        for _ in 0..STEPS {
            apply_random_step(&mut rng, &mut model, &mut host);
            check_invariants(&model, &host);
        }
    }
}

#[test]
fn counters_survive_layer_destruction() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut host = HostBuffers::new();
    let mut model = build_model(&mut host);

    for _ in 0..500 {
        apply_random_step(&mut rng, &mut model, &mut host);
    }
    model.destroy_layer(&mut host, 1).unwrap();
    check_invariants(&model, &host);
    assert_eq!(model.counters().portions, 2 * PORTIONS_PER_LAYER);
}

#[test]
fn repeated_setters_are_idempotent() {
    let mut host = HostBuffers::new();
    let mut model = build_model(&mut host);
    let id = PortionId(3);

    for _ in 0..5 {
        model.set_visible(&mut host, 0, id, true).unwrap();
        model.set_highlighted(&mut host, 0, id, true).unwrap();
        model.set_transparent(&mut host, 0, id, true).unwrap();
    }
    assert_eq!(model.counters().visible, 1);
    assert_eq!(model.counters().highlighted, 1);
    assert_eq!(model.counters().transparent, 1);

    for _ in 0..5 {
        model.set_transparent(&mut host, 0, id, false).unwrap();
    }
    assert_eq!(model.counters().transparent, 0);
    check_invariants(&model, &host);
}
