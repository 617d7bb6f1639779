//! Scenario 5 ("child failure escalates") and scenario 6 ("parent stop
//! cascades").

mod support;

use std::fmt;

use kinfolk::{body, ActorRef, Failure, Pattern, State, Supervision, System};
use support::{expect, probe};

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom")
    }
}

impl std::error::Error for Boom {}

#[tokio::test]
async fn child_failure_escalates_and_is_removed() {
    let system = System::new();
    let (tx, mut rx) = probe::<(bool, bool)>();

    let parent = body(move |mut ctx| {
        let tx = tx.clone();
        async move {
            ctx.spawn(
                "child",
                body(|_child_ctx| async move { Err::<(), Failure>(Failure::new(Boom)) }),
            )
            .expect("spawn child");

            let sup_msg = ctx
                .get(Pattern::of_type::<Supervision>("Supervision"))
                .await
                .expect("supervision message arrives");
            let sup = sup_msg
                .downcast_ref::<Supervision>()
                .expect("payload is Supervision")
                .clone();
            let during_startup = match sup {
                Supervision::Error(_, _, during_startup) => during_startup,
                other => panic!("expected Error, got {other:?}"),
            };
            let children_empty_after = !ctx.myself().has_children();
            tx.event((during_startup, children_empty_after));
            Ok::<(), Failure>(())
        }
    });

    let root = system
        .spawn_root_procedure("parent", parent)
        .expect("spawn root");

    let (during_startup, children_empty_after) = expect(&mut rx).await;
    assert!(!during_startup);
    assert!(children_empty_after);

    system.shutdown(&root).await.unwrap();
}

#[tokio::test]
async fn parent_stop_cascades_children_before_terminal() {
    let system = System::new();
    let (parent_tx, mut parent_rx) = probe::<ActorRef>();
    let (child_tx, mut child_rx) = probe::<(ActorRef, ActorRef)>();
    let (gp_tx, mut gp_rx) = probe::<Supervision>();

    let grandparent = body(move |mut ctx| {
        let parent_tx = parent_tx.clone();
        let child_tx = child_tx.clone();
        let gp_tx = gp_tx.clone();
        async move {
            let parent = ctx
                .spawn(
                    "parent",
                    body(move |mut parent_ctx| {
                        let child_tx = child_tx.clone();
                        async move {
                            let c1 = parent_ctx
                                .spawn(
                                    "child-1",
                                    body(|mut c| async move {
                                        c.get_any().await.ok();
                                        Ok::<(), Failure>(())
                                    }),
                                )
                                .expect("spawn child-1");
                            let c2 = parent_ctx
                                .spawn(
                                    "child-2",
                                    body(|mut c| async move {
                                        c.get_any().await.ok();
                                        Ok::<(), Failure>(())
                                    }),
                                )
                                .expect("spawn child-2");
                            child_tx.event((c1, c2));
                            parent_ctx.get_any().await.ok();
                            Ok::<(), Failure>(())
                        }
                    }),
                )
                .expect("spawn parent");

            parent_tx.event(parent);

            let sup_msg = ctx
                .get(Pattern::of_type::<Supervision>("Supervision"))
                .await
                .expect("supervision message arrives");
            let sup = sup_msg
                .downcast_ref::<Supervision>()
                .expect("payload is Supervision")
                .clone();
            gp_tx.event(sup);
            Ok::<(), Failure>(())
        }
    });

    let root = system
        .spawn_root_procedure("grandparent", grandparent)
        .expect("spawn root");

    let parent = expect(&mut parent_rx).await;
    let (child1, child2) = expect(&mut child_rx).await;

    parent.stop(false).expect("stop parent");
    parent.terminal().await;

    assert_eq!(parent.state(), State::Stopped);
    assert_eq!(child1.state(), State::Stopped);
    assert_eq!(child2.state(), State::Stopped);

    match expect(&mut gp_rx).await {
        Supervision::Stopped(p) => assert_eq!(p.path(), "/grandparent/parent"),
        other => panic!("expected Stopped, got {other:?}"),
    }

    system.shutdown(&root).await.unwrap();
}
