#![no_main]
use libfuzzer_sys::fuzz_target;

use steptree::model::{run_equivalence, EngineKind, Op};

fuzz_target!(|input: (EngineKind, Vec<Op>)| {
    let (engine, ops) = input;
    run_equivalence(engine, ops)
});
