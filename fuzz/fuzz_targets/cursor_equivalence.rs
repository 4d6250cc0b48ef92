#![no_main]

use libfuzzer_sys::fuzz_target;
use wavl_ostree::model::CursorEquivalenceInput;

fuzz_target!(|input: CursorEquivalenceInput| {
    wavl_ostree::model::run_cursor_equivalence(input.values, input.ops);
});
