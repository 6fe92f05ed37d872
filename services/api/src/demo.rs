use crate::infra::{
    parse_access, parse_datetime, HeuristicConfidenceSource, InMemoryAbTestRegistry,
    InMemoryAssignmentStore, InMemoryRuleStore, StaticItemCatalog,
};
use chrono::NaiveDateTime;
use clap::Args;
use clearquote::config::AppConfig;
use clearquote::error::AppError;
use clearquote::pricing::{
    AccessDifficulty, ItemCatalog, QuoteInput, QuoteItem, QuoteOptions, QuoteOutcome,
    QuoteService,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Collection postcode
    #[arg(long)]
    pub(crate) postcode: String,
    /// Item to clear, as type:quantity (repeatable), e.g. --item sofa:2
    #[arg(long = "item", required = true, value_parser = parse_item)]
    pub(crate) items: Vec<QuoteItem>,
    /// Access conditions: easy, normal, difficult or very-difficult
    #[arg(long, default_value = "normal", value_parser = parse_access)]
    pub(crate) access: AccessDifficulty,
    /// Collection date (YYYY-MM-DD or YYYY-MM-DDTHH:MM)
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) date: Option<NaiveDateTime>,
    /// Items need special handling
    #[arg(long)]
    pub(crate) special_handling: bool,
    /// Attach an AI confidence verdict to the quote
    #[arg(long)]
    pub(crate) use_ai: bool,
    /// Price under this A/B test (requires --customer-key)
    #[arg(long)]
    pub(crate) ab_test: Option<String>,
    /// Stable customer key for A/B assignment
    #[arg(long)]
    pub(crate) customer_key: Option<String>,
}

fn parse_item(raw: &str) -> Result<QuoteItem, String> {
    let (item_type_id, quantity) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected type:quantity, got '{raw}'"))?;
    let quantity = quantity
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("bad quantity in '{raw}' ({err})"))?;
    Ok(QuoteItem {
        item_type_id: item_type_id.trim().to_string(),
        quantity,
    })
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let catalog: Arc<dyn ItemCatalog> = Arc::new(StaticItemCatalog::seeded());
    let service = QuoteService::new(
        Arc::new(InMemoryRuleStore::seeded()),
        Arc::new(InMemoryAssignmentStore::default()),
        Arc::new(InMemoryAbTestRegistry::seeded()),
        catalog.clone(),
        Arc::new(HeuristicConfidenceSource::new(catalog)),
        config.engine,
    );

    let input = QuoteInput {
        postcode: args.postcode,
        items: args.items,
        access_difficulty: args.access,
        collection_date: args.date,
        special_handling: args.special_handling,
    };
    let options = QuoteOptions {
        use_ai: args.use_ai,
        ab_test_id: args.ab_test,
        customer_key: args.customer_key,
    };

    let outcome = service.calculate(&input, &options)?;
    render_outcome(&input, &outcome);
    Ok(())
}

fn render_outcome(input: &QuoteInput, outcome: &QuoteOutcome) {
    println!("Quote for {}", input.postcode);
    for item in &input.items {
        println!("- {} x{}", item.item_type_id, item.quantity);
    }

    if let Some(assignment) = &outcome.ab_assignment {
        println!(
            "\nPriced under test '{}', arm {}",
            assignment.test_id,
            assignment.arm.label()
        );
    }

    let breakdown = &outcome.breakdown;
    println!("\nBreakdown");
    println!("- Base:       {:>10}", breakdown.base_cost);
    println!("- Labour:     {:>10}", breakdown.labor_cost);
    println!("- Disposal:   {:>10}", breakdown.disposal_cost);
    println!("- Transport:  {:>10}", breakdown.transport_cost);
    println!("- Surcharges: {:>10}", breakdown.surcharges_total);
    println!("- Discounts:  {:>10}", breakdown.discounts_total);
    println!("- Tax:        {:>10}", breakdown.tax_amount);
    println!("- Total:      {:>10}", breakdown.total_amount);
    println!(
        "Estimated duration: {} hours",
        breakdown.estimated_duration_hours
    );

    println!("\nApplied rules");
    for record in &breakdown.applied_rules {
        match record.percentage_rate {
            Some(rate) => println!(
                "- [{}] {} -> {} on {} ({}%)",
                record.rule_type.label(),
                record.rule_name,
                record.amount_applied,
                record.cost_center.label(),
                rate
            ),
            None => println!(
                "- [{}] {} -> {} on {}",
                record.rule_type.label(),
                record.rule_name,
                record.amount_applied,
                record.cost_center.label()
            ),
        }
    }

    if outcome.conflicts.is_empty() {
        println!("\nConflicts: none");
    } else {
        println!("\nConflicts flagged for review");
        for conflict in &outcome.conflicts {
            println!(
                "- {} on {} (rules {:?})",
                conflict.kind.summary(),
                conflict.cost_center.label(),
                conflict.rule_ids
            );
        }
    }

    if let Some(confidence) = &outcome.confidence {
        println!(
            "\nConfidence: {:.2} ({})",
            confidence.overall,
            confidence.band.label()
        );
        println!("- item recognition:    {:.2}", confidence.item_recognition);
        println!("- quantity estimation: {:.2}", confidence.quantity_estimation);
        println!("- access assessment:   {:.2}", confidence.access_assessment);
        println!("- pricing model fit:   {:.2}", confidence.pricing_model_fit);
        if confidence.review_required {
            println!("Human review required before sending.");
        }
    }
}
