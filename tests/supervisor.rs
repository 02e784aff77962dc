#![cfg(unix)]

mod common;

use std::path::Path;
use std::time::Duration;

use common::{eventually, fast_config, script};
use suitegrader::supervisor::{ProcessSupervisor, CLIENT, SERVER};
use sysinfo::{Pid, ProcessStatus, System};

fn args(script: &Path) -> Vec<String> {
    vec![script.to_string_lossy().to_string()]
}

#[tokio::test]
async fn output_is_drained_once_stdout_first() {
    let dir = tempfile::tempdir().unwrap();
    let s = script(dir.path(), "talk.sh", "echo hello\necho oops >&2\nsleep 5\n");

    let mut sup = ProcessSupervisor::new(&fast_config());
    sup.start(CLIENT, Path::new("/bin/sh"), None, &args(&s)).await.unwrap();

    assert!(eventually(Duration::from_secs(3), || sup.pending_output_len(CLIENT) == 11).await);

    assert_eq!(sup.output(CLIENT), "hello\noops\n");
    assert_eq!(sup.output(CLIENT), "");
    assert_eq!(sup.pending_output_len(CLIENT), 0);

    sup.stop_all().await;
}

#[tokio::test]
async fn input_reaches_the_process() {
    let mut sup = ProcessSupervisor::new(&fast_config());
    sup.start(CLIENT, Path::new("/bin/cat"), None, &[]).await.unwrap();
    assert!(sup.is_running(CLIENT));

    assert!(sup.send_input(CLIENT, "ping").await);
    assert!(eventually(Duration::from_secs(3), || sup.pending_output_len(CLIENT) > 0).await);
    assert_eq!(sup.output(CLIENT), "ping\n");

    sup.stop(CLIENT).await;
    assert!(!sup.is_running(CLIENT));
    assert!(!sup.send_input(CLIENT, "late").await);
}

#[tokio::test]
async fn working_dir_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let s = script(dir.path(), "pwd.sh", "pwd\nsleep 5\n");

    let mut sup = ProcessSupervisor::new(&fast_config());
    sup.start(SERVER, Path::new("/bin/sh"), Some(dir.path()), &args(&s))
        .await
        .unwrap();

    assert!(eventually(Duration::from_secs(3), || sup.pending_output_len(SERVER) > 0).await);
    let out = sup.output(SERVER);
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(Path::new(out.trim()).canonicalize().unwrap(), expected);

    sup.stop_all().await;
}

#[tokio::test]
async fn restarting_a_name_replaces_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let s = script(dir.path(), "idle.sh", "sleep 30\n");

    let mut sup = ProcessSupervisor::new(&fast_config());
    sup.start(CLIENT, Path::new("/bin/sh"), None, &args(&s)).await.unwrap();
    sup.start(CLIENT, Path::new("/bin/sh"), None, &args(&s)).await.unwrap();

    assert_eq!(sup.names(), vec![CLIENT]);
    sup.stop_all().await;
    assert!(sup.names().is_empty());
}

#[tokio::test]
async fn stop_kills_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let s = script(dir.path(), "tree.sh", "sleep 30 &\necho $!\nwait\n");

    let mut sup = ProcessSupervisor::new(&fast_config());
    sup.start(SERVER, Path::new("/bin/sh"), None, &args(&s)).await.unwrap();

    assert!(eventually(Duration::from_secs(3), || sup.pending_output_len(SERVER) > 0).await);
    let child_pid: u32 = sup.output(SERVER).trim().parse().unwrap();

    sup.stop(SERVER).await;
    sup.stop(SERVER).await;
    assert!(!sup.is_running(SERVER));

    let gone = eventually(Duration::from_secs(3), || {
        let mut system = System::new();
        system.refresh_processes();
        system
            .process(Pid::from_u32(child_pid))
            .map_or(true, |p| p.status() == ProcessStatus::Zombie)
    })
    .await;
    assert!(gone, "descendant {} survived stop", child_pid);
}

#[tokio::test]
async fn exited_process_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let s = script(dir.path(), "quick.sh", "echo done\n");

    let mut sup = ProcessSupervisor::new(&fast_config());
    sup.start(CLIENT, Path::new("/bin/sh"), None, &args(&s)).await.unwrap();

    assert!(eventually(Duration::from_secs(3), || !sup.is_running(CLIENT)).await);
    sup.stop_all().await;
}
