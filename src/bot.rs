use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::clock;
use crate::command::Command;
use crate::filter::MessageFilter;
use crate::platform::{ChatPlatform, InboundEvent};
use crate::schedule::info::RunInfo;
use crate::schedule::{Departure, ScheduleStore};

const STORE_FAULT_REPLY: &str =
    "Sorry, I couldn't read the train schedule right now. Please try again later.";

/// Answers channel mentions with the next matching departure
pub struct TrainBot {
    name: String,
    platform: Arc<dyn ChatPlatform>,
    store: ScheduleStore,
    filter: MessageFilter,
}

impl TrainBot {
    pub fn new(name: &str, platform: Arc<dyn ChatPlatform>, store: ScheduleStore) -> Self {
        let filter = MessageFilter::new(name, platform.self_identity());
        Self {
            name: name.to_string(),
            platform,
            store,
            filter,
        }
    }

    /// Handle events one at a time until the platform closes the stream
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.on_event(&event).await {
                error!(
                    "Failed to reply in channel {} to user {}: {:#}",
                    event.channel, event.user, e
                );
            }
        }
        info!("Event stream closed");
    }

    /// Returns whether the event was accepted and answered
    pub async fn on_event(&self, event: &InboundEvent) -> Result<bool> {
        if !self.filter.accept(event) {
            debug!("Ignoring event in {:?} from {:?}", event.channel, event.user);
            return Ok(false);
        }

        info!(
            "Mention in channel {} from {}: {}",
            event.channel, event.user, event.text
        );
        self.handle(event, clock::now()).await?;
        Ok(true)
    }

    /// Build and send the single reply for an accepted event. Lookup faults
    /// become a reply; only send/channel failures are returned.
    pub async fn handle(&self, event: &InboundEvent, now: NaiveTime) -> Result<()> {
        let reply = match Command::parse(&event.text) {
            Command::Help => self.help_text(),
            Command::Lookup {
                origin,
                destination,
                time_hint,
            } => {
                // A hint can only push the boundary later, never into the past
                let after = time_hint
                    .as_deref()
                    .and_then(clock::parse_user_time)
                    .map_or(now, |hint| hint.max(now));
                self.lookup_reply(&origin, &destination, after).await
            }
        };

        let channel = self
            .platform
            .resolve_channel_name(&event.channel)
            .await?
            .with_context(|| format!("Unknown channel: {}", event.channel))?;

        self.platform.post_message(&channel, &reply, true).await
    }

    async fn lookup_reply(&self, origin: &str, destination: &str, after: NaiveTime) -> String {
        match self
            .store
            .find_next_departure(origin, destination, after)
            .await
        {
            Ok(Some(departure)) => departure_text(&departure),
            Ok(None) => {
                info!(
                    "No train from {:?} to {:?} after {}",
                    origin, destination, after
                );
                no_match_text(origin, destination)
            }
            Err(e) => {
                error!(
                    "Schedule lookup failed for {:?} -> {:?}: {:#}",
                    origin, destination, e
                );
                STORE_FAULT_REPLY.to_string()
            }
        }
    }

    fn help_text(&self) -> String {
        format!(
            "Hi!\n Usage: {} <command>\n \n where <command> are the following arguments:\n {{origin}}, {{destination}}, {{time of day}}",
            self.name
        )
    }

    /// Record this run and greet the default channel the first time the bot
    /// is started against a store. Never fatal.
    pub async fn first_run_check(&self, timestamp: &str) {
        let run_info = RunInfo::new(self.store.connection());
        let first_run = match run_info.record_run(timestamp).await {
            Ok(first) => first,
            Err(e) => {
                error!("Failed to record run: {:#}", e);
                return;
            }
        };

        if !first_run {
            debug!("Last run updated to {}", timestamp);
            return;
        }

        if let Err(e) = self.send_welcome().await {
            warn!("Failed to send welcome message: {:#}", e);
        }
    }

    async fn send_welcome(&self) -> Result<()> {
        let Some(channel) = self.platform.default_channel().await? else {
            info!("Bot is not a member of any channel, skipping welcome message");
            return Ok(());
        };

        let text = format!("Hi!\n Just say `{}` to invoke me!", self.name);
        self.platform.post_message(&channel, &text, true).await?;
        info!("Sent welcome message to #{}", channel);
        Ok(())
    }
}

fn departure_text(departure: &Departure) -> String {
    format!(
        "The next train from {} to {} is {} ({}), leaving at {} and arriving at {}",
        departure.origin,
        departure.destination,
        departure.train_name,
        departure.train_number,
        clock::format_display(departure.departs),
        clock::format_display(departure.arrives),
    )
}

fn no_match_text(origin: &str, destination: &str) -> String {
    if destination.is_empty() {
        format!("No upcoming train found from {}.", origin)
    } else {
        format!("No upcoming train found from {} to {}.", origin, destination)
    }
}
