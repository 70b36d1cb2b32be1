use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn capture(stream: impl Read + Send + 'static) -> (Arc<Mutex<String>>, thread::JoinHandle<()>) {
    let captured = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&captured);
    let handle = thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(Result::ok) {
            let mut data = sink.lock().unwrap();
            data.push_str(&line);
            data.push('\n');
        }
    });
    (captured, handle)
}

#[test]
fn headless_binary_runs_to_completion() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_water"))
        .args(["--headless", "--frames", "120", "--seed", "1", "--resolution", "32"])
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn the water binary");

    let (stdout, stdout_handle) = capture(child.stdout.take().unwrap());
    let (stderr, stderr_handle) = capture(child.stderr.take().unwrap());

    let timeout = Duration::from_secs(60);
    match child.wait_timeout_secs(timeout) {
        Ok(Some(status)) => {
            stdout_handle.join().expect("stdout reader thread panicked");
            stderr_handle.join().expect("stderr reader thread panicked");
            let stdout = stdout.lock().unwrap();
            let stderr = stderr.lock().unwrap();
            eprintln!("--- water STDOUT ---\n{stdout}");
            eprintln!("--- water STDERR ---\n{stderr}");

            assert!(status.success(), "water exited with error: {:?}", status.code());
            assert_eq!(stdout.matches("simulation progress").count(), 2);
            assert!(stdout.contains("headless run finished"));
        }
        Ok(None) => {
            child.kill().expect("failed to kill timed-out process");
            panic!("water timed out after {timeout:?}");
        }
        Err(e) => panic!("failed to wait for water: {e}"),
    }
}

#[test]
fn bad_config_fails_with_a_message() {
    let output = Command::new(env!("CARGO_BIN_EXE_water"))
        .args(["--headless", "--config", "/definitely/missing.json"])
        .output()
        .expect("failed to run the water binary");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/definitely/missing.json"), "{stderr}");
}

trait ChildExt {
    fn wait_timeout_secs(&mut self, duration: Duration) -> std::io::Result<Option<std::process::ExitStatus>>;
}

impl ChildExt for std::process::Child {
    fn wait_timeout_secs(&mut self, duration: Duration) -> std::io::Result<Option<std::process::ExitStatus>> {
        let start_time = std::time::Instant::now();
        loop {
            match self.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start_time.elapsed() > duration {
                        return Ok(None);
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}
