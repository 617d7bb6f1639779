//! Scenario 4: `stop()` cancels a body suspended on an external awaitable;
//! the cancellation actually reaches the awaited future, no exception
//! propagates, and the parent still receives an orderly `Stopped` report.

mod support;

use kinfolk::{body, Failure, Pattern, Supervision, System};
use support::{expect, probe, Probe};

struct CancelGuard(Probe<()>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.event(());
    }
}

async fn pending_forever(guard_tx: Probe<()>) {
    let _guard = CancelGuard(guard_tx);
    std::future::pending::<()>().await;
}

#[tokio::test]
async fn stop_cancels_external_await() {
    let system = System::new();
    let (cancel_tx, mut cancel_rx) = probe::<()>();
    let (sup_tx, mut sup_rx) = probe::<Supervision>();

    let parent = body(move |mut ctx| {
        let cancel_tx = cancel_tx.clone();
        let sup_tx = sup_tx.clone();
        async move {
            let child = ctx
                .spawn(
                    "waiter",
                    body(move |mut child_ctx| {
                        let cancel_tx = cancel_tx.clone();
                        async move {
                            let outcome = child_ctx.external(pending_forever(cancel_tx)).await;
                            assert!(outcome.is_err(), "external await should be cancelled");
                            Ok::<(), Failure>(())
                        }
                    }),
                )
                .expect("spawn waiter");

            // Let the child actually reach its external suspension point
            // before stopping it.
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            child.stop(false).expect("stop waiter");

            let sup_msg = ctx
                .get(Pattern::of_type::<Supervision>("Supervision"))
                .await
                .expect("supervision message arrives");
            let sup = sup_msg
                .downcast_ref::<Supervision>()
                .expect("payload is Supervision")
                .clone();
            sup_tx.event(sup);
            Ok::<(), Failure>(())
        }
    });

    let root = system
        .spawn_root_procedure("parent", parent)
        .expect("spawn root");

    expect(&mut cancel_rx).await;

    match expect(&mut sup_rx).await {
        Supervision::Stopped(child) => assert_eq!(child.path(), "/parent/waiter"),
        other => panic!("expected a clean Stopped report, got {other:?}"),
    }

    system.shutdown(&root).await.unwrap();
}
