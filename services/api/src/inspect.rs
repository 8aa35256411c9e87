use clap::Args;
use serde_json::json;
use tidyhome::config::AppConfig;
use tidyhome::error::AppError;
use tidyhome::quotes::{Quote, QuoteEvent, QuoteId, QuoteReadCache, QuoteReadError};

use crate::infra::rest_backend;

#[derive(Args, Debug)]
pub(crate) struct QuoteShowArgs {
    /// Quote identifier
    pub(crate) id: String,
    /// Emit the quote and its events as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_quote_show(args: QuoteShowArgs) -> Result<(), AppError> {
    let QuoteShowArgs { id, json } = args;
    let Some(id) = QuoteId::parse(&id) else {
        return Err(AppError::Quote(QuoteReadError::NotFound(QuoteId(id))));
    };

    let config = AppConfig::load()?;
    let backend = rest_backend(&config)?;
    let cache = QuoteReadCache::new(backend, config.cache);

    let quote = cache.get_quote(&id).await?;
    let events = match cache.get_quote_events(&id).await {
        Ok(events) => events,
        Err(err) => {
            eprintln!("events unavailable: {err}");
            Vec::new()
        }
    };

    if json {
        let payload = json!({ "quote": quote, "events": events });
        match serde_json::to_string_pretty(&payload) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("could not render quote as JSON: {err}"),
        }
    } else {
        render_quote(&quote, &events);
    }

    Ok(())
}

pub(crate) fn render_quote(quote: &Quote, events: &[QuoteEvent]) {
    println!("Quote {}", quote.id);

    if quote.fields.is_empty() {
        println!("(no fields)");
    } else {
        for (key, value) in &quote.fields {
            println!("- {key}: {value}");
        }
    }

    if events.is_empty() {
        println!("\nHistory: none");
        return;
    }

    println!("\nHistory (newest first)");
    for event in events {
        let actor = event.actor_type.as_deref().unwrap_or("unknown");
        let source = event
            .source
            .as_deref()
            .map(|source| format!(" via {source}"))
            .unwrap_or_default();
        let changed = event.changed_fields();
        let changed = if changed.is_empty() {
            String::new()
        } else {
            format!(" [{}]", changed.join(", "))
        };
        println!(
            "- {} | {} | {}{}{}",
            event.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            event.label(),
            actor,
            source,
            changed
        );
    }
}

