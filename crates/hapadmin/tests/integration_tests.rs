//! End-to-end tests against a scripted fake daemon.
//!
//! Each fake process binds a real Unix socket and speaks the one-command
//! per-connection protocol: read a line, write the reply, close. This
//! exercises discovery, identity probing, aggregation, and fan-out dispatch
//! over the genuine transport.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hapadmin::{ConnectOptions, Controller, Error, ServerState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

/// One scripted worker process.
struct FakeProcess {
    pid: u32,
    process_num: u32,
    cum_req: i64,
    /// Per-process frontend traffic, reported as both `stot` and `req_tot`.
    req_tot: i64,
    /// Per-process backend weight, used to exercise averaging.
    pool_weight: i64,
    /// Per-process member status, used to exercise divergence detection.
    member_status: &'static str,
    /// Leave the `weight` column out of the stats header entirely.
    omit_weight: bool,
    /// Reject every admin (non-show) command with a daemon error phrase.
    fail_admin: bool,
    acl: Mutex<Vec<String>>,
}

impl FakeProcess {
    fn new(pid: u32, process_num: u32) -> Self {
        Self {
            pid,
            process_num,
            cum_req: 0,
            req_tot: 0,
            pool_weight: 100,
            member_status: "UP",
            omit_weight: false,
            fail_admin: false,
            acl: Mutex::new(Vec::new()),
        }
    }

    fn respond(&self, cmd: &str) -> String {
        if cmd == "show info" {
            return format!(
                "Name: HAProxy\nVersion: 1.8.1\nRelease_date: 2017/11/26\n\
                 node: lb-1\ndescription: edge balancer\nPid: {}\nProcess_num: {}\n\
                 Uptime: 0d 0h01m30s\nUptime_sec: 90\nCumReq: {}\nMaxconn: 2000\n",
                self.pid, self.process_num, self.cum_req
            );
        }
        if cmd == "show stat -1 -1 -1" {
            if self.omit_weight {
                return format!(
                    "# pxname,svname,qcur,scur,slim,stot,status,check_status,rate,req_tot,\n\
                     www,FRONTEND,,10,1000,{req},OPEN,,3,{req},\n\
                     bk,srv1,0,4,,212,{status},L4OK,1,,\n\
                     bk,BACKEND,0,10,200,537,UP,,3,,\n\n",
                    req = self.req_tot,
                    status = self.member_status,
                );
            }
            return format!(
                "# pxname,svname,qcur,scur,slim,stot,weight,status,check_status,rate,req_tot,\n\
                 www,FRONTEND,,10,1000,{req},,OPEN,,3,{req},\n\
                 bk,srv1,0,4,,212,100,{status},L4OK,1,,\n\
                 bk,BACKEND,0,10,200,537,{weight},UP,,3,,\n\n",
                req = self.req_tot,
                weight = self.pool_weight,
                status = self.member_status,
            );
        }
        if cmd == "show acl #0" {
            let acl = self.acl.lock().unwrap();
            if acl.is_empty() {
                return "\n".to_string();
            }
            return acl
                .iter()
                .enumerate()
                .map(|(i, entry)| format!("0x{i:x} {entry}\n"))
                .collect();
        }
        if self.fail_admin {
            return "Permission denied\n".to_string();
        }
        if let Some(pattern) = cmd.strip_prefix("add acl #0 ") {
            self.acl.lock().unwrap().push(pattern.to_string());
            return "\n".to_string();
        }
        if let Some(key) = cmd.strip_prefix("del acl #0 ") {
            let mut acl = self.acl.lock().unwrap();
            let before = acl.len();
            acl.retain(|entry| entry != key);
            if acl.len() == before {
                return "Key not found.\n".to_string();
            }
            return "\n".to_string();
        }
        // every other admin command silently succeeds
        "\n".to_string()
    }
}

/// Bind `dir/admin<N>.sock` and serve the scripted process on it.
fn spawn(dir: &Path, process: Arc<FakeProcess>) -> (PathBuf, JoinHandle<()>) {
    let path = dir.join(format!("admin{}.sock", process.process_num));
    let listener = UnixListener::bind(&path).unwrap();
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let process = Arc::clone(&process);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                if reader.read_line(&mut line).await.is_err() {
                    return;
                }
                let reply = process.respond(line.trim_end());
                let mut stream = reader.into_inner();
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    (path, task)
}

async fn controller_for(dir: &Path) -> Controller {
    Controller::from_socket_dir(dir, ConnectOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_discovery_skips_non_sockets() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(FakeProcess::new(102, 2)));
    std::fs::write(dir.path().join("README"), "not a socket").unwrap();

    let lb = controller_for(dir.path()).await;
    assert_eq!(lb.processes().len(), 2, "regular file must be skipped");
    // discovery order follows sorted socket paths
    assert_eq!(lb.process_ids(), vec![101, 102]);
}

#[tokio::test]
async fn test_requests_sums_across_processes() {
    let dir = tempfile::tempdir().unwrap();
    let mut one = FakeProcess::new(101, 1);
    one.cum_req = 5;
    let mut two = FakeProcess::new(102, 2);
    two.cum_req = 7;
    spawn(dir.path(), Arc::new(one));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    assert_eq!(lb.requests().await.unwrap(), 12);
}

#[tokio::test]
async fn test_unknown_metric_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));

    let lb = controller_for(dir.path()).await;
    let err = lb.metric("req_tot").await.unwrap_err();
    assert!(
        matches!(err, Error::UnknownMetric(_)),
        "req_tot is frontend-scoped, not daemon-scoped: {err}"
    );
}

#[tokio::test]
async fn test_version_is_uniform() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(FakeProcess::new(102, 2)));

    let lb = controller_for(dir.path()).await;
    assert_eq!(lb.version().await.unwrap(), "1.8.1");
    assert_eq!(lb.release_date().await.unwrap(), "2017/11/26");
    assert_eq!(lb.node_name().await.unwrap(), "lb-1");
    assert_eq!(lb.description().await.unwrap(), "edge balancer");
}

#[tokio::test]
async fn test_frontend_requests_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let mut one = FakeProcess::new(101, 1);
    one.req_tot = 250;
    let mut two = FakeProcess::new(102, 2);
    two.req_tot = 287;
    spawn(dir.path(), Arc::new(one));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    let frontend = lb.frontend("www").await.unwrap();
    assert_eq!(frontend.requests().await.unwrap(), 537);
    // slim is 1000 on each process and sums across them
    assert_eq!(frontend.maxconn().await.unwrap(), 2000);
}

#[tokio::test]
async fn test_pool_weight_averages_with_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let mut one = FakeProcess::new(101, 1);
    one.pool_weight = 100;
    let mut two = FakeProcess::new(102, 2);
    two.pool_weight = 117;
    spawn(dir.path(), Arc::new(one));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    let pool = lb.pool("bk").await.unwrap();
    // (100 + 117) / 2 truncates toward zero
    assert_eq!(pool.metric("weight").await.unwrap(), 108);
}

#[tokio::test]
async fn test_unknown_entity_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));

    let lb = controller_for(dir.path()).await;
    let err = lb.frontend("missing").await.unwrap_err();
    assert!(matches!(err, Error::EntityNotFound { .. }));

    let err = lb.member("srv9", Some("bk")).await.unwrap_err();
    match err {
        Error::EntityNotFound { name, .. } => assert_eq!(name, "bk/srv9"),
        other => panic!("expected EntityNotFound, got {other}"),
    }
}

#[tokio::test]
async fn test_member_lookup_without_pool_returns_sequence() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));

    let lb = controller_for(dir.path()).await;
    let members = lb.member("srv1", None).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name(), "srv1");
    assert_eq!(members[0].pool_name(), "bk");
}

#[tokio::test]
async fn test_member_status_is_uniform_read() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(FakeProcess::new(102, 2)));

    let lb = controller_for(dir.path()).await;
    let members = lb.member("srv1", Some("bk")).await.unwrap();
    assert_eq!(members[0].status().await.unwrap(), "UP");
    assert_eq!(members[0].weight().await.unwrap(), 100);
}

#[tokio::test]
async fn test_divergent_status_read_is_inconsistent() {
    let dir = tempfile::tempdir().unwrap();
    let mut two = FakeProcess::new(102, 2);
    two.member_status = "DOWN";
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    let members = lb.member("srv1", Some("bk")).await.unwrap();
    let err = members[0].status().await.unwrap_err();
    match err {
        Error::InconsistentResult { outcomes, .. } => {
            let replies: Vec<&str> = outcomes.iter().map(|o| o.reply.as_str()).collect();
            assert_eq!(replies, vec!["UP", "DOWN"], "both verdicts must be reported");
        }
        other => panic!("expected InconsistentResult, got {other}"),
    }
}

#[tokio::test]
async fn test_missing_column_is_inconsistent_not_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut two = FakeProcess::new(102, 2);
    two.omit_weight = true;
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    let pool = lb.pool("bk").await.unwrap();
    // a process whose table lacks the column disagrees about the table
    // shape; that must surface, not feed a zero into the aggregate
    let err = pool.metric("weight").await.unwrap_err();
    match err {
        Error::InconsistentResult { outcomes, .. } => {
            assert_eq!(outcomes.len(), 1);
            assert_eq!(outcomes[0].process, 2);
            assert!(outcomes[0].reply.contains("weight"));
        }
        other => panic!("expected InconsistentResult, got {other}"),
    }
}

#[tokio::test]
async fn test_fanout_write_succeeds_on_all_processes() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(FakeProcess::new(102, 2)));

    let lb = controller_for(dir.path()).await;
    lb.set_maxconn(4000).await.unwrap();
    lb.set_rate_limit_ssl_sessions(300).await.unwrap();

    let members = lb.member("srv1", Some("bk")).await.unwrap();
    members[0].set_state(ServerState::Drain).await.unwrap();
}

#[tokio::test]
async fn test_partial_failure_is_inconsistent() {
    let dir = tempfile::tempdir().unwrap();
    let mut two = FakeProcess::new(102, 2);
    two.fail_admin = true;
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    let err = lb.set_maxconn(4000).await.unwrap_err();
    match err {
        Error::InconsistentResult { outcomes, .. } => {
            assert_eq!(outcomes.len(), 2, "every process must be accounted for");
            let failed: Vec<u32> = outcomes
                .iter()
                .filter(|o| !o.success)
                .map(|o| o.process)
                .collect();
            assert_eq!(failed, vec![2], "the failing process must be named");
        }
        other => panic!("expected InconsistentResult, got {other}"),
    }
}

#[tokio::test]
async fn test_uniform_failure_propagates_daemon_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut one = FakeProcess::new(101, 1);
    one.fail_admin = true;
    let mut two = FakeProcess::new(102, 2);
    two.fail_admin = true;
    spawn(dir.path(), Arc::new(one));
    spawn(dir.path(), Arc::new(two));

    let lb = controller_for(dir.path()).await;
    let err = lb.set_maxconn(4000).await.unwrap_err();
    match err {
        Error::CommandFailed(text) => assert_eq!(text, "Permission denied"),
        other => panic!("expected CommandFailed, got {other}"),
    }
}

#[tokio::test]
async fn test_acl_round_trip_with_benign_second_delete() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));

    let lb = controller_for(dir.path()).await;
    lb.add_acl(0, "10.0.0.1").await.unwrap();
    lb.add_acl(0, "10.0.0.2").await.unwrap();
    assert_eq!(lb.show_acl(Some(0)).await.unwrap().len(), 2);

    lb.del_acl(0, "10.0.0.1").await.unwrap();
    // deleting an entry that is already gone is a no-op, not a failure
    lb.del_acl(0, "10.0.0.1").await.unwrap();

    let remaining = lb.show_acl(Some(0)).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].ends_with("10.0.0.2"));
}

#[tokio::test]
async fn test_empty_acl_listing_is_empty_not_one_blank_line() {
    let dir = tempfile::tempdir().unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(101, 1)));

    let lb = controller_for(dir.path()).await;
    assert!(lb.show_acl(Some(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_picks_up_replaced_process() {
    let dir = tempfile::tempdir().unwrap();
    let (path, task) = spawn(dir.path(), Arc::new(FakeProcess::new(100, 1)));

    let mut lb = controller_for(dir.path()).await;
    assert_eq!(lb.process_ids(), vec![100]);

    // daemon restart: same socket path, new process behind it
    task.abort();
    std::fs::remove_file(&path).unwrap();
    spawn(dir.path(), Arc::new(FakeProcess::new(200, 1)));

    lb.refresh().await.unwrap();
    assert_eq!(lb.process_ids(), vec![200]);
}

#[tokio::test]
async fn test_stale_handle_surfaces_connect_error() {
    let dir = tempfile::tempdir().unwrap();
    let (path, task) = spawn(dir.path(), Arc::new(FakeProcess::new(100, 1)));

    let lb = controller_for(dir.path()).await;
    task.abort();
    std::fs::remove_file(&path).unwrap();

    let err = lb.requests().await.unwrap_err();
    assert!(matches!(err, Error::Connect { .. }), "got {err}");
}
