mod support;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chkr_core::{
    CancellationToken, DRAIN_GRACE, EndpointSpec, Error, Expectation, NoopSink, Runner,
    ValueCheck,
};
use tokio::time::Instant;
use support::{CollectingSink, Reply, ScriptedTransport};

fn runner(transport: &Arc<ScriptedTransport>) -> Runner<ScriptedTransport> {
    Runner::from_shared(Arc::clone(transport)).with_sink(Arc::new(NoopSink))
}

#[tokio::test]
async fn empty_endpoint_list_is_rejected() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::ok(""));
    let err = runner(&transport).run(&[]).await;
    anyhow::ensure!(matches!(err, Err(Error::NoEndpoints)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn invalid_endpoint_fails_before_any_request() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::ok(""));
    let endpoints = vec![
        EndpointSpec::new("fine", "http://scripted/"),
        EndpointSpec::new("broken", "http://scripted/").with_concurrency(4, 0, Duration::ZERO),
    ];

    let err = runner(&transport).run(&endpoints).await;
    match err {
        Err(Error::InvalidEndpoint { endpoint, .. }) => anyhow::ensure!(endpoint == "broken"),
        other => anyhow::bail!("expected InvalidEndpoint, got {other:?}"),
    }
    anyhow::ensure!(transport.calls() == 0, "no request may be sent");
    Ok(())
}

#[tokio::test]
async fn single_path_counts_one_logical_attempt() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::new(Reply::Status(503, ""), Duration::ZERO));
    let spec = EndpointSpec::new("down", "http://scripted/").with_retry(4, Duration::ZERO);

    let run = runner(&transport).run(&[spec]).await?;
    let s = &run.endpoints[0];

    anyhow::ensure!(transport.calls() == 5);
    anyhow::ensure!(s.total_requests == 1);
    anyhow::ensure!(s.failure_count == 1);
    anyhow::ensure!(s.attempts_total == 5);
    anyhow::ensure!(s.status_codes == BTreeMap::from([(503, 1)]));
    anyhow::ensure!(
        s.validation_failures
            == BTreeMap::from([("expected status code 200, got 503".to_string(), 1)])
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_retries_consume_slots() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::new(Reply::Timeout, Duration::ZERO));
    let spec = EndpointSpec::new("flaky", "http://scripted/")
        .with_retry(3, Duration::ZERO)
        .with_concurrency(2, 10, Duration::ZERO);

    let run = runner(&transport).run(&[spec]).await?;
    let s = &run.endpoints[0];

    anyhow::ensure!(transport.calls() == 10, "calls = {}", transport.calls());
    anyhow::ensure!(s.total_requests == 10);
    anyhow::ensure!(s.failure_count == 10);
    anyhow::ensure!(s.attempts_total == 10);
    anyhow::ensure!(s.timeout_count == 10);
    anyhow::ensure!(s.status_codes == BTreeMap::from([(0, 10)]));
    anyhow::ensure!(s.concurrent_users == 2);
    anyhow::ensure!(s.latency.is_none());
    Ok(())
}

#[tokio::test]
async fn retry_attempt_numbers_restart_after_exhaustion() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::new(Reply::Status(500, ""), Duration::ZERO));
    let sink = Arc::new(CollectingSink::default());
    let spec = EndpointSpec::new("retry", "http://scripted/")
        .with_retry(1, Duration::ZERO)
        .with_concurrency(1, 5, Duration::ZERO);

    Runner::from_shared(Arc::clone(&transport))
        .with_sink(sink.clone())
        .run(&[spec])
        .await?;

    let attempts: Vec<u32> = sink.events().iter().map(|e| e.attempt).collect();
    anyhow::ensure!(attempts == vec![1, 2, 1, 2, 1], "attempts = {attempts:?}");
    Ok(())
}

#[tokio::test]
async fn uneven_total_drops_remainder() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::ok(""));
    let spec =
        EndpointSpec::new("uneven", "http://scripted/").with_concurrency(3, 10, Duration::ZERO);

    let run = runner(&transport).run(&[spec]).await?;
    let s = &run.endpoints[0];

    anyhow::ensure!(s.total_requests == 9);
    anyhow::ensure!(s.requests_per_user == 3);
    anyhow::ensure!(transport.calls() == 9);
    Ok(())
}

#[tokio::test]
async fn cancellation_mid_run_records_unstarted_slots() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::new(
        Reply::Status(200, ""),
        Duration::from_millis(20),
    ));
    let cancel = CancellationToken::new();
    let sink = Arc::new(CollectingSink::cancelling_after(cancel.clone(), 2));

    let endpoints = vec![
        EndpointSpec::new("load", "http://scripted/").with_concurrency(5, 50, Duration::ZERO),
        EndpointSpec::new("never", "http://scripted/"),
    ];

    let runner = Runner::from_shared(Arc::clone(&transport))
        .with_sink(sink.clone())
        .with_cancellation(cancel);
    let run = tokio::time::timeout(Duration::from_secs(5), runner.run(&endpoints)).await??;

    anyhow::ensure!(run.cancelled);
    anyhow::ensure!(run.endpoints.len() == 1, "later endpoints are skipped");

    let s = &run.endpoints[0];
    anyhow::ensure!(s.cancelled);
    anyhow::ensure!(s.total_requests == 50, "every slot is accounted for");
    anyhow::ensure!(s.success_count >= 2, "completed requests are kept");
    anyhow::ensure!(s.success_count + s.failure_count == 50);
    anyhow::ensure!(s.cancelled_count >= 40, "cancelled = {}", s.cancelled_count);
    anyhow::ensure!(s.success_count + s.cancelled_count == 50);
    anyhow::ensure!(transport.calls() <= 10, "calls = {}", transport.calls());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrency_delay_separates_requests_of_one_user() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::ok(""));
    let spec = EndpointSpec::new("paced", "http://scripted/").with_concurrency(
        2,
        6,
        Duration::from_secs(1),
    );

    let started = Instant::now();
    let run = runner(&transport).run(&[spec]).await?;
    let elapsed = started.elapsed();

    // Three requests per user: pauses before the 2nd and 3rd only.
    anyhow::ensure!(
        elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100),
        "elapsed = {elapsed:?}"
    );
    anyhow::ensure!(run.endpoints[0].total_requests == 6);
    anyhow::ensure!(transport.calls() == 6);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn retry_slot_waits_retry_delay_instead_of_concurrency_delay() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::new(Reply::Status(500, ""), Duration::ZERO));
    let sink = Arc::new(CollectingSink::default());
    let spec = EndpointSpec::new("mixed", "http://scripted/")
        .with_retry(1, Duration::from_secs(5))
        .with_concurrency(1, 4, Duration::from_secs(1));

    let started = Instant::now();
    let run = Runner::from_shared(Arc::clone(&transport))
        .with_sink(sink.clone())
        .run(&[spec])
        .await?;
    let elapsed = started.elapsed();

    // fail -> retry (5s) -> exhausted -> next (1s) -> fail -> retry (5s)
    anyhow::ensure!(
        elapsed >= Duration::from_secs(11) && elapsed < Duration::from_millis(11_100),
        "elapsed = {elapsed:?}"
    );
    let attempts: Vec<u32> = sink.events().iter().map(|e| e.attempt).collect();
    anyhow::ensure!(attempts == vec![1, 2, 1, 2], "attempts = {attempts:?}");
    anyhow::ensure!(run.endpoints[0].failure_count == 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_with_requests_in_flight_aborts_after_drain_grace() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::new(
        Reply::Status(200, ""),
        Duration::from_secs(3600),
    ));
    let cancel = CancellationToken::new();
    let spec =
        EndpointSpec::new("stuck", "http://scripted/").with_concurrency(5, 50, Duration::ZERO);

    let runner = runner(&transport).with_cancellation(cancel.clone());
    let cancel_after = Duration::from_secs(1);
    tokio::spawn(async move {
        tokio::time::sleep(cancel_after).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let run = runner.run(&[spec]).await?;
    let elapsed = started.elapsed();

    let deadline = cancel_after + DRAIN_GRACE;
    anyhow::ensure!(
        elapsed >= deadline && elapsed < deadline + Duration::from_secs(1),
        "elapsed = {elapsed:?}"
    );
    anyhow::ensure!(run.cancelled);

    let s = &run.endpoints[0];
    anyhow::ensure!(s.cancelled);
    anyhow::ensure!(transport.calls() == 5, "one request per user was in flight");
    anyhow::ensure!(s.total_requests == 50, "every slot is accounted for");
    anyhow::ensure!(s.cancelled_count == 50, "cancelled = {}", s.cancelled_count);
    anyhow::ensure!(s.failure_count == 50);
    anyhow::ensure!(s.status_codes == BTreeMap::from([(0, 50)]));
    anyhow::ensure!(s.latency.is_none());
    Ok(())
}

#[tokio::test]
async fn cancellation_before_start_runs_nothing() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::ok(""));
    let runner = runner(&transport);
    runner.cancellation_token().cancel();

    let run = runner
        .run(&[EndpointSpec::new("skipped", "http://scripted/")])
        .await?;

    anyhow::ensure!(run.cancelled);
    anyhow::ensure!(run.endpoints.is_empty());
    anyhow::ensure!(run.total_requests == 0);
    anyhow::ensure!(run.requests_per_second == 0.0);
    anyhow::ensure!(transport.calls() == 0);
    Ok(())
}

#[tokio::test]
async fn run_summary_rolls_up_endpoints() -> anyhow::Result<()> {
    let transport = Arc::new(ScriptedTransport::ok(r#"{"title":"foo"}"#));
    let sink = Arc::new(CollectingSink::default());
    let pass = Expectation {
        values: vec![ValueCheck::new("title", "foo")],
        ..Expectation::default()
    };
    let fail = Expectation {
        values: vec![ValueCheck::new("title", "bar")],
        ..Expectation::default()
    };

    let endpoints = vec![
        EndpointSpec::new("pass", "http://scripted/").with_expect(pass),
        EndpointSpec::new("fail", "http://scripted/")
            .with_expect(fail)
            .with_concurrency(2, 4, Duration::ZERO),
    ];
    let run = Runner::from_shared(Arc::clone(&transport))
        .with_sink(sink.clone())
        .run(&endpoints)
        .await?;

    anyhow::ensure!(!run.cancelled);
    anyhow::ensure!(run.total_endpoints() == 2);
    anyhow::ensure!(run.total_requests == 5);
    anyhow::ensure!(run.success_count == 1);
    anyhow::ensure!(run.failure_count == 4);
    anyhow::ensure!((run.success_rate - 20.0).abs() < 1e-9);
    anyhow::ensure!(run.total_bytes == 5 * 15);
    anyhow::ensure!(run.has_failures());
    anyhow::ensure!(run.latency_min.is_some() && run.latency_mean.is_some());
    anyhow::ensure!(sink.tests_started() == 2 && sink.tests_completed() == 2);

    let fail = &run.endpoints[1];
    anyhow::ensure!(
        fail.validation_failures.get("path title expected bar, got foo") == Some(&4)
    );
    anyhow::ensure!((fail.error_rate - 100.0).abs() < 1e-9);
    Ok(())
}
