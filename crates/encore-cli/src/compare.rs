use anyhow::Context;
use encore_domain_eval::{ComparisonReport, MatchStatus, TrackComparator};
use encore_ports::model::Track;
use encore_ports::storage::GameSettings;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub fn load_track(path: &Path) -> anyhow::Result<Track> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let track: Track = serde_json::from_slice(&data)
        .with_context(|| format!("parsing track {}", path.display()))?;
    track
        .validate()
        .with_context(|| format!("invalid track {}", path.display()))?;
    Ok(track)
}

pub fn compare_files(
    original: &Path,
    recorded: &Path,
    settings: &GameSettings,
) -> anyhow::Result<ComparisonReport> {
    let original = load_track(original)?;
    let recorded = load_track(recorded)?;
    let comparator = TrackComparator::new(settings.comparator, settings.grade_cutoffs);
    Ok(comparator.compare(&original, &recorded))
}

pub fn render_report(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "grade {}  overall {}  notes {:.0}%  timing {:.0}%  velocity {:.0}%",
        report.grade,
        report.overall_score,
        report.note_accuracy,
        report.timing_accuracy,
        report.velocity_accuracy,
    );
    let _ = writeln!(
        out,
        "matched {}  missed {}  extra {}",
        report.matched_notes, report.missed_notes, report.extra_notes
    );
    for result in &report.results {
        if result.status == MatchStatus::Correct {
            continue;
        }
        let note = result
            .target_note
            .or(result.played_note)
            .map(|n| format!("{} @ {:.3}s", n.note, n.start_time))
            .unwrap_or_default();
        let _ = writeln!(out, "  {:?}: {}", result.status, note);
    }
    for line in &report.feedback {
        let _ = writeln!(out, "{line}");
    }
    out
}
