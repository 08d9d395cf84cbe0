#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::Command;

fn dwmtlv() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dwmtlv"));
    cmd.env_remove("DWMTLV_PORT").args(["--log-level", "error"]);
    cmd
}

fn missing_port() -> PathBuf {
    PathBuf::from(format!(
        "/tmp/dwmtlv-missing-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn version_prints_package_version() {
    let output = dwmtlv().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("dwmtlv {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_as_json() {
    let output = dwmtlv()
        .args(["--format", "json", "version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version output should be JSON");
    assert_eq!(value["name"], "dwmtlv");
    assert_eq!(value["default_port"], "/dev/ttyACM0");
    assert_eq!(value["default_baud_rate"], 115_200);
}

#[test]
fn doctor_missing_port_returns_30() {
    let port = missing_port();
    let output = dwmtlv()
        .args(["--format", "json", "doctor"])
        .arg(&port)
        .output()
        .expect("doctor should run");

    assert_eq!(output.status.code(), Some(30));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("doctor output should be JSON");
    assert_eq!(value["overall"], "fail");
    assert_eq!(value["port"], port.display().to_string());
}

#[test]
fn doctor_reads_port_from_env() {
    let port = missing_port();
    let output = dwmtlv()
        .env("DWMTLV_PORT", &port)
        .args(["--format", "json", "doctor"])
        .output()
        .expect("doctor should run");

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("doctor output should be JSON");
    assert_eq!(value["port"], port.display().to_string());
}

#[test]
fn loc_missing_port_returns_transport_error() {
    let output = dwmtlv()
        .arg("loc")
        .arg(missing_port())
        .output()
        .expect("loc should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open failed"));
}

#[test]
fn loc_rejects_zero_frame_timeout() {
    let output = dwmtlv()
        .arg("loc")
        .arg(missing_port())
        .args(["--frame-timeout", "0"])
        .output()
        .expect("loc should run");

    assert_eq!(output.status.code(), Some(64));
}

#[cfg(target_os = "linux")]
mod pty {
    use std::io::{Read, Write};
    use std::process::Stdio;

    use dwmtlv_transport::testing::open_pty;

    use super::*;

    #[test]
    fn loc_prints_one_report_against_fake_module() {
        let (mut master, slave_path) = open_pty().expect("pty should open");

        let child = dwmtlv()
            .args(["--format", "json", "loc"])
            .arg(&slave_path)
            .args(["--count", "1", "--interval", "0", "--frame-timeout", "5s"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("loc should start");

        let mut request = [0u8; 2];
        master.read_exact(&mut request).expect("request should arrive");
        assert_eq!(request, [0x0C, 0x00]);

        let mut reply = vec![0x00, 0x00, 0x40, 0x01, 0x00, 0x41, 0x0D];
        reply.extend_from_slice(&100i32.to_le_bytes());
        reply.extend_from_slice(&200i32.to_le_bytes());
        reply.extend_from_slice(&300i32.to_le_bytes());
        reply.push(90);
        reply.extend_from_slice(&[0x48, 0x0E, 0x01]);
        reply.extend_from_slice(&[0x11, 0x22, 0, 0, 0, 0, 0, 0]);
        reply.extend_from_slice(&1500u32.to_le_bytes());
        reply.push(75);
        master.write_all(&reply).expect("reply should be written");

        let output = child.wait_with_output().expect("loc should exit");
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().expect("one report line");
        let value: serde_json::Value = serde_json::from_str(line).expect("report should be JSON");
        assert_eq!(value["position"]["x"], 100);
        assert_eq!(value["position"]["quality"], 90);
        assert_eq!(value["anchors"][0]["address"], "1122000000000000");
        assert_eq!(value["anchors"][0]["distance"], 1500);
    }

    #[test]
    fn loc_exits_on_interrupt_while_module_stalls_mid_frame() {
        let (mut master, slave_path) = open_pty().expect("pty should open");

        let mut child = dwmtlv()
            .args(["--format", "json", "loc"])
            .arg(&slave_path)
            .args(["--interval", "0"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("loc should start");

        let mut request = [0u8; 2];
        master.read_exact(&mut request).expect("request should arrive");
        assert_eq!(request, [0x0C, 0x00]);

        // Status, then a position frame that never gets past its type byte.
        master
            .write_all(&[0x40, 0x01, 0x00, 0x41])
            .expect("partial reply should be written");
        std::thread::sleep(std::time::Duration::from_millis(200));

        // SAFETY: signalling our own child process.
        let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) };
        assert_eq!(rc, 0);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let status = loop {
            if let Some(status) = child.try_wait().expect("child should be waitable") {
                break status;
            }
            if std::time::Instant::now() >= deadline {
                let _ = child.kill();
                panic!("loc did not exit after SIGINT");
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        };
        assert_eq!(status.code(), Some(130));
    }
}
