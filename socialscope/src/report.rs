//! Plain-text and JSON rendering of analysis runs.

use socialscope_core::analytics::{
    AnalysisContext, AnalysisOutput, AnalysisRun, DistributionSummary, GrowthProjection,
    LifecycleReport, PairReport, PlatformOverview, RunStatus, ViralityReport,
};
use socialscope_core::analytics::lifecycle::{SECONDS_PER_DAY, SECONDS_PER_HOUR};
use socialscope_core::format::{format_count, format_grouped, format_percent, truncate_preview};
use socialscope_core::TableInfo;
use std::path::{Path, PathBuf};

/// Characters of post content shown in the virality report.
const PREVIEW_CHARS: usize = 200;

fn print_header(title: &str) {
    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("╰{}╯", "─".repeat(60));
}

fn print_section(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "-".repeat(title.chars().count()));
}

// ============================================
// Runs
// ============================================

/// Print every run, then the list of charts written.
pub fn print_text(runs: &[AnalysisRun], ctx: &AnalysisContext, charts: &[PathBuf]) {
    for run in runs {
        print_run(run, ctx);
    }

    if !charts.is_empty() {
        print_section("Charts");
        for path in charts {
            println!("  {}", path.display());
        }
    }
    println!();
}

fn print_run(run: &AnalysisRun, ctx: &AnalysisContext) {
    match (&run.status, &run.output) {
        (RunStatus::Success, Some(output)) => match output {
            AnalysisOutput::Overview(overview) => print_overview(overview),
            AnalysisOutput::Growth(projection) => print_growth(projection),
            AnalysisOutput::Virality(report) => print_virality(report, ctx.top_n),
            AnalysisOutput::Lifecycle(report) => print_lifecycle(report),
            AnalysisOutput::Pairs(report) => print_pairs(report, ctx.top_n),
        },
        _ => {
            let icon = match run.status {
                RunStatus::Success => "+",
                RunStatus::InsufficientData => "-",
                RunStatus::Error => "!",
            };
            print_header(&title_for(&run.name));
            let message = run.error_message.as_deref().unwrap_or("no output");
            match run.status {
                RunStatus::InsufficientData => println!("[{}] No data: {}", icon, message),
                _ => println!("[{}] {} failed: {}", icon, run.name, message),
            }
        }
    }
}

fn title_for(name: &str) -> String {
    match name {
        "overview" => "PLATFORM OVERVIEW".to_string(),
        "growth" => "GROWTH PROJECTION".to_string(),
        "virality" => "VIRAL POSTS".to_string(),
        "lifecycle" => "CONTENT LIFECYCLE".to_string(),
        "pairs" => "ENGAGEMENT PAIRS".to_string(),
        other => other.to_uppercase(),
    }
}

/// Print all runs as one pretty JSON document.
pub fn print_json(
    datastore: &Path,
    runs: &[AnalysisRun],
    charts: &[PathBuf],
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "datastore": datastore.display().to_string(),
        "runs": runs,
        "charts": charts
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================
// Schema
// ============================================

pub fn print_tables(tables: &[TableInfo]) {
    print_header("DATASET TABLES");
    for table in tables {
        println!();
        println!("{} ({} rows)", table.name, format_count(table.row_count));
        for column in &table.columns {
            println!("  {:<24} {}", column.name, column.decl_type);
        }
    }
    println!();
}

// ============================================
// Overview
// ============================================

fn print_overview(overview: &PlatformOverview) {
    print_header(&title_for("overview"));

    println!();
    println!("{:<20} {:>10}", "Table", "Rows");
    for table in &overview.tables {
        println!("{:<20} {:>10}", table.name, format_count(table.row_count));
    }

    print_section("Lurkers");
    match overview.lurker_share() {
        Some(share) => println!(
            "  {} of {} users ({}) never posted, commented or reacted",
            format_count(overview.lurker_count),
            format_count(overview.total_users),
            format_percent(share)
        ),
        None => println!("  No users recorded"),
    }

    print_section("Top Influencers");
    if overview.top_influencers.is_empty() {
        println!("  No engagement recorded");
    }
    for (i, influencer) in overview.top_influencers.iter().enumerate() {
        println!(
            "  {}. {:<20} {:>8} engagement ({} reactions, {} comments)",
            i + 1,
            influencer.username,
            format_count(influencer.engagement_score()),
            format_count(influencer.total_reactions),
            format_count(influencer.total_comments)
        );
    }

    print_section("Repeated Content");
    if overview.repeated_content.is_empty() {
        println!("  None found");
    }
    for item in &overview.repeated_content {
        println!(
            "  user #{} {} x{}: {}",
            item.user_id,
            item.source.as_str(),
            item.repeat_count,
            truncate_preview(&item.content, 60)
        );
    }
}

// ============================================
// Growth
// ============================================

fn print_growth(projection: &GrowthProjection) {
    print_header(&title_for("growth"));
    let plan = &projection.capacity;

    print_section("Current State");
    println!("  Date:                 {}", projection.current_date);
    println!(
        "  Cumulative activity:  {}",
        format_count(projection.current_activity)
    );
    println!("  Servers:              {}", plan.current_servers);
    println!(
        "  Activity per server:  {}",
        format_grouped(projection.activity_per_server, 2)
    );

    print_section("Projection");
    println!("  Date:                 {}", projection.projected_date);
    println!(
        "  Projected activity:   {}",
        format_grouped(projection.projected_activity, 0)
    );
    println!(
        "  Growth factor:        {}x",
        format_grouped(projection.growth_factor, 2)
    );
    println!("  Trend degree:         {}", projection.trend.degree());

    print_section("Capacity Plan");
    println!(
        "  Servers (base):        {}",
        format_grouped(plan.servers_base, 2)
    );
    println!(
        "  With redundancy:       {}",
        format_grouped(plan.servers_with_redundancy, 2)
    );
    println!("  Servers required:      {}", format_count(plan.servers_required));
    println!(
        "  Additional servers:    {}",
        format_count(plan.additional_servers)
    );
}

// ============================================
// Virality
// ============================================

fn print_virality(report: &ViralityReport, top_n: usize) {
    print_header(&title_for("virality"));
    println!();
    println!("  Posts analyzed: {}", format_count(report.posts_analyzed as i64));
    println!(
        "  Average post: {} reactions, {} comments, {} total engagement",
        format_grouped(report.averages.reactions, 2),
        format_grouped(report.averages.comments, 2),
        format_grouped(report.averages.total_engagement, 2)
    );

    for (rank, scored) in report.top(top_n).iter().enumerate() {
        let post = &scored.post;
        let author = post
            .username
            .clone()
            .unwrap_or_else(|| format!("user #{}", post.user_id));

        print_section(&format!("#{} Post {} by {}", rank + 1, post.post_id, author));
        if let Some(created) = post.created_at {
            println!("  Posted:            {}", created);
        }
        println!("  Followers:         {}", format_count(post.follower_count));
        println!("  Reactions:         {}", format_count(post.reaction_count));
        println!(
            "  Comments:          {} ({} unique commenters)",
            format_count(post.comment_count),
            format_count(post.unique_commenters)
        );
        println!(
            "  Total engagement:  {}",
            format_count(scored.total_engagement)
        );
        println!(
            "  Engagement rate:   {}",
            format_grouped(scored.engagement_rate, 2)
        );
        println!(
            "  Comment ratio:     {}",
            format_grouped(scored.comment_ratio, 3)
        );
        println!(
            "  VIRALITY SCORE:    {}",
            format_grouped(scored.virality_score, 4)
        );
        if let Some(multiplier) = report.engagement_multiplier(scored) {
            println!(
                "  Why it's viral: {}x more engagement than the average post",
                format_grouped(multiplier, 1)
            );
        }
        println!("  \"{}\"", truncate_preview(&post.content, PREVIEW_CHARS));
    }
}

// ============================================
// Lifecycle
// ============================================

fn print_distribution(label: &str, summary: &DistributionSummary, unit: &str) {
    println!(
        "  {:<18} mean {} {unit}, median {} {unit}",
        label,
        format_grouped(summary.mean, 2),
        format_grouped(summary.median, 2),
        unit = unit
    );
}

fn print_percentiles(label: &str, summary: &DistributionSummary) {
    println!(
        "  {:<18} min {} | 25% {} | 50% {} | 75% {} | max {}",
        label,
        format_grouped(summary.min, 2),
        format_grouped(summary.q1, 2),
        format_grouped(summary.median, 2),
        format_grouped(summary.q3, 2),
        format_grouped(summary.max, 2)
    );
}

fn print_lifecycle(report: &LifecycleReport) {
    print_header(&title_for("lifecycle"));
    println!();
    println!(
        "  Posts with comments: {} ({} comments analyzed)",
        format_count(report.posts.len() as i64),
        format_count(report.events_analyzed as i64)
    );
    for warning in &report.warnings {
        println!("  Warning: {}", warning);
    }

    let hours = SECONDS_PER_HOUR;
    let days = SECONDS_PER_DAY;

    print_section("Time to First Comment");
    print_distribution("Hours:", &report.first_engagement.scaled(hours), "h");
    print_distribution("Days:", &report.first_engagement.scaled(days), "d");

    print_section("Time to Last Comment");
    print_distribution("Hours:", &report.last_engagement.scaled(hours), "h");
    print_distribution("Days:", &report.last_engagement.scaled(days), "d");

    print_section("Engagement Duration (first to last comment)");
    print_distribution("Hours:", &report.duration.scaled(hours), "h");
    print_distribution("Days:", &report.duration.scaled(days), "d");

    print_section("Percentiles (hours)");
    print_percentiles("First comment:", &report.first_engagement.scaled(hours));
    print_percentiles("Last comment:", &report.last_engagement.scaled(hours));
    print_percentiles("Duration:", &report.duration.scaled(hours));

    print_section("Posts by Comment Count");
    println!(
        "  Single comment:   {}",
        format_count(report.single_engagement_posts as i64)
    );
    println!(
        "  Multiple comments: {}",
        format_count(report.multi_engagement_posts as i64)
    );
}

// ============================================
// Pairs
// ============================================

fn print_pairs(report: &PairReport, top_n: usize) {
    print_header(&title_for("pairs"));
    println!();
    println!(
        "  {} comment patterns, {} reaction patterns, {} directional engagements",
        format_count(report.comment_patterns as i64),
        format_count(report.reaction_patterns as i64),
        format_count(report.directional_engagements as i64)
    );
    println!("  Unique pairs: {}", format_count(report.pairs.len() as i64));

    for (rank, pair) in report.top(top_n).iter().enumerate() {
        print_section(&format!("#{} {}", rank + 1, pair.label()));
        println!(
            "  Combined score:  {} ({} comments x2, {} reactions x1)",
            format_count(pair.combined_score),
            format_count(pair.comment_count),
            format_count(pair.reaction_count)
        );
        println!(
            "  {} -> {}: {} comments, {} reactions",
            pair.user_low, pair.user_high, pair.low_to_high.comments, pair.low_to_high.reactions
        );
        println!(
            "  {} -> {}: {} comments, {} reactions",
            pair.user_high, pair.user_low, pair.high_to_low.comments, pair.high_to_low.reactions
        );
        println!(
            "  Engagement Balance: {} ({} reciprocal)",
            pair.balance.label(),
            format_percent(pair.reciprocity)
        );
        if let Some(multiplier) = report.multiplier(pair) {
            println!(
                "  {}x the average pair score",
                format_grouped(multiplier, 1)
            );
        }
    }

    let d = &report.distribution;
    print_section("Pair Score Distribution");
    println!(
        "  Average {} | Median {}",
        format_grouped(d.mean, 2),
        format_grouped(d.median, 2)
    );
    print_percentiles("Scores:", d);
}
