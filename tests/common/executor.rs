use std::sync::Once;

static INIT: Once = Once::new();

/// Let `leptos::task::spawn_local` run on tokio. Spawning requires a surrounding `LocalSet`.
pub fn init_executor() {
    INIT.call_once(|| {
        any_spawner::Executor::init_tokio().expect("executor to be set only once");
    });
}

/// Give locally spawned tasks the chance to run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
