//! The executing flag is process-wide, so it is tested in its own binary
//! and from a single test function.

use sish::governor;

#[test]
fn test_executing_flag_follows_commands() {
    assert!(!governor::is_executing());
    {
        let _guard = governor::executing();
        assert!(governor::is_executing());
    }
    assert!(!governor::is_executing());

    let mut sh = sish::Interpreter::new("sish", false);
    sh.execute_line_with_output("echo hi", &mut Vec::new()).unwrap();
    assert!(!governor::is_executing());
}
