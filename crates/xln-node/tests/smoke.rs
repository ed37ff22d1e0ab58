//! Process-level smoke test for the `xln-node` binary (teacher's
//! process-spawn pattern from `chronx-node/tests/smoke.rs`, adapted: xln-node
//! has no RPC surface to poll, so this asserts the scripted demo run
//! completes cleanly within a timeout rather than querying live state).

use std::process::{Command, Stdio};
use std::time::Duration;

#[test]
fn demo_run_completes_cleanly() {
    let node_bin = env!("CARGO_BIN_EXE_xln-node");
    let mut child = Command::new(node_bin)
        .args(["--ticks", "12", "--tick-interval-ms", "100", "--j-block-delay-ms", "200"])
        .env("RUST_LOG", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn xln-node");

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().expect("poll child") {
            break status;
        }
        if std::time::Instant::now() > deadline {
            let _ = child.kill();
            panic!("xln-node did not exit within 10 seconds");
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    assert!(status.success(), "xln-node exited with {status:?}");
}
