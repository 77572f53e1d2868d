use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use tradedesk_core::Bot;

/// How often expired trade confirmations are looked for.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Disable the controls of trade confirmations that ran out of time.
///
/// Presses on an expired confirmation are already rejected when they arrive;
/// this loop only makes the expiry visible on the message itself.
pub async fn trade_sweep_loop(bot: Arc<Bot>) {
    let mut interval = interval(SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let expired = bot.sweep_trades().await;
        if expired > 0 {
            info!("Expired {} trade confirmations", expired);
        }
    }
}
