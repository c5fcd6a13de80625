//! Static technique guides and the keyword coach shown next to a task.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub title: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskGuide {
    pub overview: &'static str,
    pub steps: &'static [&'static str],
    pub pitfalls: &'static [&'static str],
    pub resources: &'static [Resource],
    pub instruments: &'static [&'static str],
}

pub const DEFAULT_GUIDE: TaskGuide = TaskGuide {
    overview: "Focus on economy of motion, neutral wrist, and consistent needle angles. \
               Score favors clean needle handling and minimal tissue trauma.",
    steps: &[
        "Check needle angle (70–90°) and lock the driver before entering the model.",
        "Advance with small wrist motions; avoid sweeping arcs that torque tissue.",
        "Seat the needle with the wrist, not the elbow; keep forearm stable.",
    ],
    pitfalls: &[
        "Excessive wrist flexion causing needle wobble.",
        "Dragging the needle across the field instead of lifting cleanly.",
        "Regripping more than twice per pass, leading to frayed suture.",
    ],
    resources: &[
        Resource {
            title: "SAFE-T Needle Handling",
            url: "https://www.facs.org/quality-programs/education",
        },
        Resource {
            title: "Economy of motion primer",
            url: "https://psnet.ahrq.gov/",
        },
    ],
    instruments: &[],
};

const PALM_NEEDLE_DRIVER: TaskGuide = TaskGuide {
    overview: "Use a palmed driver for rapid, controlled rotation. The goal is three full \
               clicks with the 5 mm colored segment centered, repeated smoothly for five reps.",
    steps: &[
        "Grip: palm the handle, index on fulcrum, thumb free for counterpressure only.",
        "Engage: close until you hear/feel the first click, verifying alignment.",
        "Rotate: pronate/supinate at the wrist to drive the needle through rubber tubing without elbow motion.",
        "Release and re-cock: half-open to reposition, avoiding a full release unless necessary.",
        "Repeat five clean cycles while keeping the driver perpendicular to the tubing.",
    ],
    pitfalls: &[
        "Over-tightening the ratchet, crushing the needle and causing fray.",
        "Lifting the elbow, which destabilizes the wrist and adds drift.",
        "Letting the needle slip beyond the colored segment, losing control of bite depth.",
        "Regripping with the tips only (no palm), which slows the cycle and increases tremor.",
    ],
    resources: &[
        Resource {
            title: "Driver handling mini-drill (video)",
            url: "https://www.youtube.com/watch?v=5Oaxm7p1WTk",
        },
        Resource {
            title: "Needle control fundamentals",
            url: "https://www.aesculap-academy.com",
        },
    ],
    instruments: &[
        "Palmed needle driver",
        "Silicone/rubber tubing",
        "2-0 silk suture",
    ],
};

pub const SUGGESTED_PROMPTS: &[&str] = &[
    "How do I shave 2 seconds off my time?",
    "Why am I fraying suture on this task?",
    "What is ideal hand position for the palmed driver?",
];

pub const COACH_GREETING: &str =
    "Need help with timing, errors, or setup? Ask me anything about this task.";

pub fn guide_for(slug: &str) -> &'static TaskGuide {
    match slug {
        "palm-needle-driver" => &PALM_NEEDLE_DRIVER,
        _ => &DEFAULT_GUIDE,
    }
}

fn mentions(prompt: &str, words: &[&str]) -> bool {
    words.iter().any(|w| prompt.contains(w))
}

/// Canned advice keyed on what the question is about. `None` for a blank
/// question.
pub fn coach_reply(slug: &str, prompt: &str) -> Option<String> {
    let prompt = prompt.trim().to_lowercase();
    if prompt.is_empty() {
        return None;
    }
    let reply = if mentions(&prompt, &["time", "faster", "speed"]) {
        "Trim seconds by pre-positioning the driver before you start, limiting regrips to two, \
         and committing to wrist-only rotation. If you feel drift, pause, reset your forearm on \
         the table, and restart the cycle cleanly."
            .to_string()
    } else if mentions(&prompt, &["error", "bleed", "tissue"]) {
        "Prioritize tissue respect: lighten your grip until the ratchet just holds, and lift \
         up-and-out instead of dragging. If you see fray, inspect for over-tightened ratchet and \
         regrip closer to the colored segment."
            .to_string()
    } else if mentions(&prompt, &["setup", "position", "ergonomic"]) {
        "Set up with elbows at 90°, wrists neutral, tubing at midline, and camera or eyes aligned \
         perpendicular. Anchor your ulnar border to the table edge to damp tremor during rotation."
            .to_string()
    } else {
        let guide = guide_for(slug);
        format!(
            "Focus on: {} Also watch for: {}. Keep the driver palmed and avoid over-gripping; \
             economy of motion beats force.",
            guide.steps.first().copied().unwrap_or_default(),
            guide
                .pitfalls
                .first()
                .map(|p| p.trim_end_matches('.'))
                .unwrap_or_default(),
        )
    };
    Some(reply)
}
