//! Colorful console output for analysis runs.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

use crate::analysis::{CircuitySummary, StatusSummary};
use crate::distance::DistanceMode;
use crate::distance_matrix::MatrixStatistics;
use crate::domain::SequenceKind;
use crate::orientation::StreetOrientation;

/// Width of the content area inside summary boxes.
const BOX_WIDTH: usize = 56;

/// ASCII art banner printed at startup.
pub fn print_banner() {
    let banner = r#"
  _              _     __  __ _ _
 | |    __ _ ___| |_  |  \/  (_) | ___
 | |   / _` / __| __| | |\/| | | |/ _ \
 | |__| (_| \__ \ |_  | |  | | | |  __/
 |_____\__,_|___/\__| |_|  |_|_|_|\___|
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Route Analyzer".bright_cyan()
    );
}

/// Prints the size of the loaded dataset.
pub fn print_dataset(name: &str, routes: usize, stops: usize, packages: usize) {
    println!(
        "{} {} {} Dataset ({}): routes ({}), stops ({}), packages ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Analysis]".bright_cyan(),
        name.white().bold(),
        routes.to_formatted_string(&Locale::en).bright_yellow(),
        stops.to_formatted_string(&Locale::en).bright_yellow(),
        packages.to_formatted_string(&Locale::en).bright_yellow()
    );
}

/// Prints the start of a metric stage.
pub fn print_stage_start(stage: &str, kind: SequenceKind) {
    println!(
        "{} {} {} {} stage ({} sequence) started",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", stage).bright_cyan(),
        stage.white().bold(),
        kind.to_string().yellow()
    );
}

/// Prints the end of a metric stage with its throughput.
pub fn print_stage_end(stage: &str, kind: SequenceKind, duration: Duration, legs: usize) {
    println!(
        "{} {} {} {} stage ({} sequence) ended: time spent ({}), legs ({}), speed ({}/sec)",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", stage).bright_cyan(),
        stage.white().bold(),
        kind.to_string().yellow(),
        format_duration(duration).yellow(),
        legs.to_formatted_string(&Locale::en).white(),
        per_second(legs, duration).to_formatted_string(&Locale::en).bright_magenta().bold()
    );
}

/// Prints a progress line while legs are being fetched.
pub fn print_progress(done: usize, total: usize, elapsed: Duration, mode: DistanceMode) {
    let percentage = if total > 0 {
        done as f64 / total as f64 * 100.0
    } else {
        100.0
    };
    println!(
        "    {} Leg {:>7}/{} │ {:>5.1}% │ {} │ {}/sec │ {}",
        "→".bright_blue(),
        done.to_formatted_string(&Locale::en).white(),
        total.to_formatted_string(&Locale::en),
        percentage,
        format!("{:>6}", format_duration(elapsed)).bright_black(),
        format!("{:>6}", per_second(done, elapsed).to_formatted_string(&Locale::en))
            .bright_magenta()
            .bold(),
        mode.as_str().bright_cyan()
    );
}

/// Prints a warning line.
pub fn print_warning(message: &str) {
    println!(
        "{} {} {} {}",
        timestamp().bright_black(),
        "WARN".bright_yellow(),
        "[Analysis]".bright_cyan(),
        message
    );
}

/// Prints the closing summary box of an analysis.
pub fn print_analysis_ended(
    total_duration: Duration,
    status: &StatusSummary,
    circuity: Option<&CircuitySummary>,
) {
    println!(
        "{} {} {} Analysis ended: time spent ({}), routes ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Analysis]".bright_cyan(),
        format_duration(total_duration).yellow(),
        status.number_of_routes.to_formatted_string(&Locale::en).white()
    );

    println!();
    print_box_top();
    print_centered("ANALYSIS SUMMARY", |s| s.bright_cyan().bold().to_string());
    print_box_separator();

    let s = &status.status;
    print_row("Routes:", &status.number_of_routes.to_formatted_string(&Locale::en));
    print_row("Delivery Stops:", &s.number_of_delivery_stops.to_formatted_string(&Locale::en));
    print_row("Packages:", &s.number_of_packages.to_formatted_string(&Locale::en));
    print_row("Delivered:", &format!("{:.1}%", s.percentage_delivered));
    print_row("Rejected:", &format!("{:.1}%", s.percentage_rejected));
    print_row("Attempted:", &format!("{:.1}%", s.percentage_attempted));
    print_row("Packages/Stop:", &format!("{:.2}", s.average_packages_per_stop));

    if let Some(c) = circuity {
        print_box_separator();
        print_row("Mean Circuity:", &format!("{:.3}", c.mean));
        print_row("Min Circuity:", &format!("{:.3} ({})", c.min, c.min_route));
        print_row("Max Circuity:", &format!("{:.3} ({})", c.max, c.max_route));
    }

    print_row("Analysis Time:", &format!("{:.2}s", total_duration.as_secs_f64()));
    print_box_bottom();
    println!();
}

/// Prints distance-matrix statistics.
pub fn print_matrix_statistics(stats: Option<&MatrixStatistics>, missing: usize) {
    println!();
    print_box_top();
    print_centered("DISTANCE MATRIX", |s| s.bright_cyan().bold().to_string());
    print_box_separator();
    match stats {
        Some(stats) => {
            print_row("Legs:", &stats.count.to_formatted_string(&Locale::en));
            print_row("Mean:", &format!("{:.3} km", stats.mean));
            print_row("Std:", &format!("{:.3} km", stats.std));
            print_row("Min:", &format!("{:.3} km", stats.min));
            print_row("Max:", &format!("{:.3} km", stats.max));
        }
        None => print_row("Legs:", "0"),
    }
    print_row("Missing:", &missing.to_formatted_string(&Locale::en));
    print_box_bottom();
    println!();
}

/// Prints a street orientation summary with a bar per 10° bin.
pub fn print_orientation(name: &str, orientation: &StreetOrientation) {
    println!();
    print_box_top();
    print_centered(&format!("STREET ORIENTATION: {}", name), |s| {
        s.bright_cyan().bold().to_string()
    });
    print_box_separator();
    print_row("Edges:", &orientation.edges.to_formatted_string(&Locale::en));
    print_row("Entropy:", &format!("{:.4}", orientation.entropy));
    print_row("Order:", &format!("{:.4}", orientation.order));
    print_row(
        "Dominant:",
        &format!(
            "{:.0}° ({:.1}%)",
            orientation.dominant_direction, orientation.dominant_percentage
        ),
    );
    print_row(
        "Second:",
        &format!(
            "{:.0}° ({:.1}%)",
            orientation.second_dominant_direction, orientation.second_dominant_percentage
        ),
    );
    print_box_separator();

    let peak = orientation.counts.iter().copied().max().unwrap_or(0).max(1);
    for (i, &count) in orientation.counts.iter().enumerate() {
        let bar_len = count * 36 / peak;
        let label = format!("{:>3}°-{:>3}°", i * 10, i * 10 + 10);
        let bar = "█".repeat(bar_len);
        let padding = BOX_WIDTH - 2 - label.chars().count() - 1 - bar_len;
        println!(
            "{}  {} {}{}  {}",
            "║".bright_cyan(),
            label,
            bar.bright_magenta(),
            " ".repeat(padding),
            "║".bright_cyan()
        );
    }
    print_box_bottom();
    println!();
}

fn print_box_top() {
    println!("{}", format!("╔{}╗", "═".repeat(BOX_WIDTH + 2)).bright_cyan());
}

fn print_box_separator() {
    println!("{}", format!("╠{}╣", "═".repeat(BOX_WIDTH + 2)).bright_cyan());
}

fn print_box_bottom() {
    println!("{}", format!("╚{}╝", "═".repeat(BOX_WIDTH + 2)).bright_cyan());
}

fn print_centered(text: &str, style: impl Fn(&str) -> String) {
    let padding = (BOX_WIDTH + 2).saturating_sub(text.chars().count());
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        style(text),
        " ".repeat(right_pad),
        "║".bright_cyan()
    );
}

fn print_row(label: &str, value: &str) {
    println!(
        "{}  {:<18}{:>36}  {}",
        "║".bright_cyan(),
        label,
        value,
        "║".bright_cyan()
    );
}

fn per_second(count: usize, elapsed: Duration) -> u64 {
    if elapsed.as_secs_f64() > 0.0 {
        (count as f64 / elapsed.as_secs_f64()) as u64
    } else {
        0
    }
}

/// `250ms`, `1.50s` or `2m 5s`.
fn format_duration(d: Duration) -> String {
    match d.as_millis() {
        ms if ms < 1_000 => format!("{ms}ms"),
        ms if ms < 60_000 => format!("{:.2}s", d.as_secs_f64()),
        ms => format!("{}m {}s", ms / 60_000, ms % 60_000 / 1_000),
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
}

/// Times a metric stage and reports it when finished.
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
    kind: SequenceKind,
    legs: usize,
}

impl StageTimer {
    pub fn start(stage: &'static str, kind: SequenceKind) -> Self {
        print_stage_start(stage, kind);
        Self {
            start: Instant::now(),
            stage,
            kind,
            legs: 0,
        }
    }

    pub fn record_legs(&mut self, legs: usize) {
        self.legs += legs;
    }

    pub fn finish(self) {
        print_stage_end(self.stage, self.kind, self.start.elapsed(), self.legs);
    }
}
