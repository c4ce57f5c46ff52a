//! Property test backing spec.md §8's self-equivalence invariant:
//! `verify(C, C) == Equivalent` for any circuit `C`.

use arvak_eqcheck::{Configuration, EquivalenceCheckingManager};
use arvak_ir::{Circuit, QubitId};
use proptest::prelude::*;

const N_QUBITS: u32 = 3;

#[derive(Debug, Clone, Copy)]
enum Op {
    H(u32),
    X(u32),
    Z(u32),
    Cx(u32, u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..N_QUBITS).prop_map(Op::H),
        (0..N_QUBITS).prop_map(Op::X),
        (0..N_QUBITS).prop_map(Op::Z),
        (0..N_QUBITS, 0..N_QUBITS)
            .prop_filter("control != target", |(a, b)| a != b)
            .prop_map(|(a, b)| Op::Cx(a, b)),
    ]
}

fn build(name: &str, ops: &[Op]) -> Circuit {
    let mut circuit = Circuit::with_size(name, N_QUBITS, 0);
    for op in ops {
        match *op {
            Op::H(q) => circuit.h(QubitId(q)).unwrap(),
            Op::X(q) => circuit.x(QubitId(q)).unwrap(),
            Op::Z(q) => circuit.z(QubitId(q)).unwrap(),
            Op::Cx(c, t) => circuit.cx(QubitId(c), QubitId(t)).unwrap(),
        };
    }
    circuit
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn circuit_is_always_equivalent_to_itself(ops in prop::collection::vec(op_strategy(), 0..8)) {
        let c1 = build("c1", &ops);
        let c2 = build("c2", &ops);

        let mut config = Configuration::default();
        config.parallel = false;
        let manager = EquivalenceCheckingManager::new(c1, c2, config).unwrap();
        let results = manager.run().unwrap();
        prop_assert!(results.criterion.is_equivalent());
    }
}
