use eecalc::Session;

/// A session with a few circuit quantities already defined.
pub fn get_test_session() -> Session {
    let mut session = Session::new();
    for line in ["supply = 12V", "load = 4R", "dt = 0.5s"] {
        session
            .evaluate(line)
            .expect("test session setup does not fail");
    }
    session
}
