//! Ambient-stack tests: configuration defaults with no file present, an
//! invalid actor name rejected before a cell is created, and spawning two
//! children with the same name under one parent yielding `AlreadyExists`
//! on the second.

mod support;

use kinfolk::{body, CreateError, Failure, System};
use support::{expect, probe};

#[tokio::test]
async fn config_defaults_load_with_no_file_present() {
    std::env::set_var("KINFOLK_CONF", "/nonexistent/kinfolk-test.toml");
    let system = System::new();
    assert_eq!(system.config().mailbox.high_water_mark, 10_000);
    assert_eq!(system.config().mailbox.process_limit, 1000);
    assert!(system.config().dispatcher.pool_size >= 1);
}

#[tokio::test]
async fn invalid_actor_name_rejected_before_cell_creation() {
    let system = System::new();
    let result = system.spawn_root_procedure(
        "not a valid name!",
        body(|mut ctx| async move {
            ctx.get_any().await.ok();
            Ok::<(), Failure>(())
        }),
    );
    assert!(matches!(result, Err(CreateError::InvalidName(_))));
}

#[tokio::test]
async fn duplicate_child_name_yields_already_exists() {
    let system = System::new();
    let (tx, mut rx) = probe::<bool>();

    let parent = body(move |mut ctx| {
        let tx = tx.clone();
        async move {
            let first = ctx.spawn(
                "dup",
                body(|mut c| async move {
                    c.get_any().await.ok();
                    Ok::<(), Failure>(())
                }),
            );
            assert!(first.is_ok(), "first spawn of \"dup\" should succeed");

            let second = ctx.spawn(
                "dup",
                body(|mut c| async move {
                    c.get_any().await.ok();
                    Ok::<(), Failure>(())
                }),
            );
            tx.event(matches!(second, Err(CreateError::AlreadyExists(_))));

            ctx.get_any().await.ok();
            Ok::<(), Failure>(())
        }
    });

    let root = system
        .spawn_root_procedure("parent", parent)
        .expect("spawn root");

    assert!(expect(&mut rx).await, "second spawn should be AlreadyExists");

    system.shutdown(&root).await.unwrap();
}
