use crate::comparator::ComparisonReport;
use crate::grading::LetterGrade;
use crate::judge::HitTally;
use crate::scoring::SessionScores;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Aspect {
    Notes,
    Timing,
    Velocity,
}

fn headline(grade: LetterGrade) -> &'static str {
    match grade {
        LetterGrade::S => "Outstanding! That was nearly identical to the original.",
        LetterGrade::A => "Great performance, only small details are off.",
        LetterGrade::B => "Solid take. A little more practice will tighten it up.",
        LetterGrade::C => "You have the shape of it, keep working on the details.",
        LetterGrade::D => "Keep practicing. Listen to the original a few more times.",
    }
}

/// Feedback lines for an offline comparison, most important first.
pub fn comparison_feedback(report: &ComparisonReport) -> Vec<String> {
    let mut lines = vec![headline(report.grade).to_string()];

    // ties resolve in declaration order: notes, then timing, then velocity
    let weakest = [
        (Aspect::Notes, report.note_accuracy),
        (Aspect::Timing, report.timing_accuracy),
        (Aspect::Velocity, report.velocity_accuracy),
    ]
    .into_iter()
    .min_by_key(|(_, score)| *score)
    .filter(|(_, score)| *score < 100);

    if let Some((aspect, score)) = weakest {
        let line = match aspect {
            Aspect::Notes => format!("Note accuracy is your weakest area ({score}%). Focus on hitting the right notes."),
            Aspect::Timing => format!("Timing is your weakest area ({score}%). Try playing along with a metronome."),
            Aspect::Velocity => format!("Dynamics are your weakest area ({score}%). Watch how hard each note is played."),
        };
        lines.push(line);
    }

    let missed = report.missed_notes;
    let extra = report.extra_notes;
    if missed > extra {
        lines.push(format!("You missed {missed} note(s) from the original."));
    } else if extra > missed {
        lines.push(format!("You played {extra} note(s) that are not in the original."));
    } else if missed > 0 {
        lines.push(format!(
            "{missed} note(s) were replaced by different ones. Check the pitches."
        ));
    }

    lines
}

/// Feedback lines for a finished falling-notes or replication session.
pub fn session_feedback(tally: &HitTally, scores: &SessionScores, grade: LetterGrade) -> Vec<String> {
    if tally.total() == 0 {
        return vec!["No notes were played.".to_string()];
    }

    let mut lines = vec![headline(grade).to_string()];
    if tally.miss == 0 {
        lines.push("Full combo, no notes missed!".to_string());
    } else if tally.miss > tally.hits() {
        lines.push(format!(
            "You missed {} of {} notes. Slow down and focus on each note.",
            tally.miss,
            tally.total()
        ));
    } else {
        lines.push(format!("You missed {} note(s).", tally.miss));
    }

    if scores.timing_score < scores.accuracy_score {
        lines.push("Your hits are landing off the beat. Work on timing.".to_string());
    }
    lines
}
