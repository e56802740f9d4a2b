use encore_ports::storage::GradeCutoffs;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterGrade {
    S,
    A,
    B,
    C,
    D,
}

pub fn letter_grade(score: u32, cutoffs: &GradeCutoffs) -> LetterGrade {
    if score >= cutoffs.s {
        LetterGrade::S
    } else if score >= cutoffs.a {
        LetterGrade::A
    } else if score >= cutoffs.b {
        LetterGrade::B
    } else if score >= cutoffs.c {
        LetterGrade::C
    } else {
        LetterGrade::D
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            LetterGrade::S => "S",
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
        };
        f.write_str(letter)
    }
}
