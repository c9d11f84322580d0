//! A shared library that exports no module declaration.

#[no_mangle]
pub extern "C" fn arbor_fixture_answer() -> i32 {
    42
}
