use tokio::time::MissedTickBehavior;

use crate::client::ClassroomClient;
use crate::config::Config;
use crate::display::SlideSink;
use crate::slides::{poll_once, Session, SlideStore};

/// Polls the slide list forever, showing every slide not seen before.
///
/// A failed round is logged and retried on the next tick.
pub async fn watch(
    config: &Config,
    client: &ClassroomClient,
    store: &mut SlideStore,
    sink: &mut dyn SlideSink,
    session: Session,
) {
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        course_id = session.course_id,
        course_real_id = session.course_real_id,
        dir = %store.dir().display(),
        "Watching for new PPT"
    );
    loop {
        ticker.tick().await;
        tracing::debug!("Searching for PPT");
        match poll_once(client, store, session, config.per_page).await {
            Ok(saved) => {
                for slide in &saved {
                    if let Err(e) = sink.show(slide) {
                        tracing::warn!("Failed to display slide: {e}");
                    }
                }
            }
            Err(e) => tracing::warn!("PPT search failed: {e}"),
        }
    }
}
