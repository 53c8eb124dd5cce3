mod common;
use common::*;

fn corpus() -> Vec<String> {
    (0..200)
        .map(|i| format!("tweet {} to @user{} about #topic{} and hello", i, i % 7, i % 3))
        .collect()
}

#[test]
fn test_thread_ranks_agree_with_single_rank() {
    let ws = Workspace::new();
    let texts = corpus();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    ws.tweets("tweets.csv", &refs);

    let (expected, _stderr, exit_code) = ws.run(&["-i", "tweets.csv", "-n", "1", "-F", "json"]);
    assert_eq!(exit_code, 0);

    for n in ["2", "3", "8"] {
        let (stdout, stderr, exit_code) = ws.run(&["-i", "tweets.csv", "-n", n, "-F", "json"]);
        assert_eq!(exit_code, 0, "n={} stderr: {}", n, stderr);
        assert_eq!(stdout, expected, "n={}", n);
    }
}

#[test]
fn test_more_ranks_than_records() {
    let ws = Workspace::new();
    ws.tweets("tweets.csv", MENTION_TEXTS);

    let (stdout, _stderr, exit_code) = ws.run(&["-i", "tweets.csv", "-n", "16"]);
    assert_eq!(exit_code, 0);
    assert_eq!(
        lines(&stdout),
        vec!["The top 10 users mentioned are:", "@a: 2", "@b: 1", "@c: 1"]
    );
}

#[test]
fn test_process_ranks_agree_with_threads() {
    let ws = Workspace::new();
    let texts = corpus();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    ws.tweets("tweets.csv", &refs);

    let (expected, _stderr, exit_code) = ws.run(&["-i", "tweets.csv", "-t", "-n", "3"]);
    assert_eq!(exit_code, 0);

    let (stdout, stderr, exit_code) =
        ws.run(&["-i", "tweets.csv", "-t", "-n", "3", "--launch", "processes"]);
    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(stdout, expected);
    assert_eq!(
        lines(&stdout)[1..4],
        ["#topic0: 67", "#topic1: 67", "#topic2: 66"]
    );
}

#[test]
fn test_process_string_search() {
    let ws = Workspace::new();
    ws.tweets(
        "tweets.csv",
        &["hello world", "say hello", "nothing", "hello again", "othello"],
    );

    let (stdout, stderr, exit_code) = ws.run(&[
        "-i",
        "tweets.csv",
        "-s",
        "hello",
        "-n",
        "4",
        "--launch",
        "processes",
    ]);
    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(stdout.trim(), "hello was found 3 times.");
}

#[test]
fn test_process_single_rank_starts_no_children() {
    let ws = Workspace::new();
    ws.tweets("tweets.csv", MENTION_TEXTS);

    let (stdout, _stderr, exit_code) =
        ws.run(&["-i", "tweets.csv", "-n", "1", "--launch", "processes", "-v", "-v"]);
    assert_eq!(exit_code, 0);
    assert!(stdout.contains("@a: 2"));
}

#[test]
fn test_stats_line_per_rank() {
    let ws = Workspace::new();
    let texts = corpus();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    ws.tweets("tweets.csv", &refs);

    for launch in ["threads", "processes"] {
        let (_stdout, stderr, exit_code) =
            ws.run(&["-i", "tweets.csv", "-n", "4", "--stats", "--launch", launch]);
        assert_eq!(exit_code, 0, "stderr: {}", stderr);

        for rank in 0..4 {
            let prefix = format!("rank {}: rows read: 200 total, 50 owned", rank);
            assert!(
                stderr.lines().any(|l| l.starts_with(&prefix)),
                "{}: missing stats for rank {} in {}",
                launch,
                rank,
                stderr
            );
        }
    }
}

#[test]
fn test_verbose_logs_worker_replies() {
    let ws = Workspace::new();
    ws.tweets("tweets.csv", MENTION_TEXTS);

    let (stdout, stderr, exit_code) = ws.run(&["-i", "tweets.csv", "-n", "2", "-v"]);
    assert_eq!(exit_code, 0);
    assert!(stderr.contains("Returning counts to coordinator"), "stderr: {}", stderr);
    // logs never reach stdout
    assert!(!stdout.contains("Returning counts"));
}

#[test]
fn test_recv_timeout_accepts_duration() {
    let ws = Workspace::new();
    ws.tweets("tweets.csv", MENTION_TEXTS);

    let (stdout, _stderr, exit_code) =
        ws.run(&["-i", "tweets.csv", "-n", "3", "--recv-timeout", "30s"]);
    assert_eq!(exit_code, 0);
    assert!(stdout.contains("@a: 2"));
}
