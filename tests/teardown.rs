//! Session teardown: nothing a call starts may outlive it.

#![cfg(target_os = "linux")]

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use assert_fs::TempDir;
use assert_fs::prelude::*;
use procsession::{InvocationOptions, KillSignal, call};

const GONE_WITHIN: Duration = Duration::from_secs(5);

/// Running and not a zombie, according to `/proc`.
fn is_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The state letter follows the parenthesised command name.
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next());
    !matches!(state, Some('Z' | 'X') | None)
}

async fn wait_until_gone(pid: u32) -> bool {
    let deadline = Instant::now() + GONE_WITHIN;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !is_alive(pid)
}

async fn read_pids(path: &Path) -> Vec<u32> {
    loop {
        if let Ok(text) = tokio::fs::read_to_string(path).await {
            if text.ends_with('\n') {
                let pids: Vec<u32> = text
                    .split_whitespace()
                    .filter_map(|field| field.parse().ok())
                    .collect();
                if !pids.is_empty() {
                    return pids;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn lingering_grandchild_is_killed_after_completion() -> Result<()> {
    let done = call(
        ["sh", "-c", "sleep 30 >/dev/null 2>&1 & echo $!"],
        InvocationOptions::new(),
    )
    .await?;

    let grandchild: u32 = done.stdout_lossy().trim().parse().context("grandchild pid")?;
    assert!(
        wait_until_gone(grandchild).await,
        "background sleep {grandchild} survived the call"
    );
    Ok(())
}

#[tokio::test]
async fn term_signal_is_used_for_teardown() -> Result<()> {
    let options = InvocationOptions::new().kill_signal(KillSignal::Term);
    let done = call(["sh", "-c", "sleep 30 >/dev/null 2>&1 & echo $!"], options).await?;

    let grandchild: u32 = done.stdout_lossy().trim().parse()?;
    assert!(wait_until_gone(grandchild).await);
    Ok(())
}

#[tokio::test]
async fn dropping_the_call_kills_the_whole_session() -> Result<()> {
    let temp = TempDir::new()?;
    let pid_file = temp.child("pids");
    let script = format!(
        "sleep 30 >/dev/null 2>&1 & echo $$ $! > '{}'; wait",
        pid_file.path().display()
    );

    let mut running = Box::pin(call(["sh", "-c", script.as_str()], InvocationOptions::new()));
    let pids = tokio::select! {
        result = &mut running => anyhow::bail!("call finished before cancellation: {result:?}"),
        pids = tokio::time::timeout(Duration::from_secs(10), read_pids(pid_file.path())) => {
            pids.context("session never reported its pids")?
        }
    };
    drop(running);

    assert_eq!(pids.len(), 2, "expected leader and grandchild pids: {pids:?}");
    for pid in pids {
        assert!(wait_until_gone(pid).await, "process {pid} outlived the cancelled call");
    }
    Ok(())
}

#[tokio::test]
async fn timing_out_a_call_leaves_nothing_behind() -> Result<()> {
    let temp = TempDir::new()?;
    let pid_file = temp.child("pid");
    let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.path().display());

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        call(["sh", "-c", script.as_str()], InvocationOptions::new()),
    )
    .await;
    assert!(outcome.is_err(), "sleep 30 cannot finish in 500ms");
    assert!(started.elapsed() < Duration::from_secs(5));

    let pids = tokio::time::timeout(Duration::from_secs(5), read_pids(pid_file.path()))
        .await
        .context("leader never wrote its pid")?;
    for pid in pids {
        assert!(wait_until_gone(pid).await, "leader {pid} survived the timeout");
    }
    Ok(())
}
