use serde::Serialize;

/// Pixel distance the ruler aims for between two major ticks.
pub const TARGET_MAJOR_PX: f64 = 120.0;
/// Narrowest gap allowed between two minor ticks.
pub const MIN_MINOR_PX: f64 = 8.0;

const STEP_CANDIDATES: [f64; 16] = [
    0.1, 0.2, 0.5, 1.0, 2.0, 4.0, 5.0, 8.0, 10.0, 15.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];
const FIVE_WAY_STEPS: [f64; 7] = [5.0, 10.0, 20.0, 60.0, 120.0, 300.0, 600.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RulerSteps {
    pub major_seconds: f64,
    pub minor_seconds: f64,
    /// Number of minor intervals inside one major interval.
    pub divisions: u32,
}

/// Picks the major step closest to [`TARGET_MAJOR_PX`] and subdivides it by
/// 5 or 4, fewer when minor ticks would crowd below [`MIN_MINOR_PX`].
pub fn ruler_steps(px_per_second: f64) -> RulerSteps {
    let mut major = STEP_CANDIDATES[0];
    let mut best_diff = f64::INFINITY;
    for candidate in STEP_CANDIDATES {
        let diff = (candidate * px_per_second - TARGET_MAJOR_PX).abs();
        if diff < best_diff {
            major = candidate;
            best_diff = diff;
        }
    }

    let mut divisions: u32 = if FIVE_WAY_STEPS.contains(&major) { 5 } else { 4 };
    while divisions > 1 && major / f64::from(divisions) * px_per_second < MIN_MINOR_PX {
        divisions -= 1;
    }

    RulerSteps {
        major_seconds: major,
        minor_seconds: major / f64::from(divisions),
        divisions,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickKind {
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulerTick {
    pub seconds: f64,
    pub x_px: f64,
    pub kind: TickKind,
    /// Only major ticks carry a label.
    pub label: Option<String>,
}

/// Every tick for a timeline of `total_seconds` drawn `total_px` wide.
pub fn ruler_ticks(total_seconds: f64, total_px: f64) -> Vec<RulerTick> {
    if total_seconds.is_nan() || total_px.is_nan() || total_seconds <= 0.0 || total_px <= 0.0 {
        return Vec::new();
    }

    let steps = ruler_steps(total_px / total_seconds);
    let x_at = |seconds: f64| (seconds / total_seconds * total_px).round();

    let mut ticks = Vec::new();
    let mut major_index = 0u32;
    loop {
        let seconds = f64::from(major_index) * steps.major_seconds;
        if seconds > total_seconds + 1e-6 {
            break;
        }
        ticks.push(RulerTick {
            seconds,
            x_px: x_at(seconds),
            kind: TickKind::Major,
            label: Some(tick_label(seconds, steps.major_seconds)),
        });
        for minor_index in 1..steps.divisions {
            let minor = seconds + f64::from(minor_index) * steps.minor_seconds;
            if minor > total_seconds + 1e-6 {
                break;
            }
            ticks.push(RulerTick {
                seconds: minor,
                x_px: x_at(minor),
                kind: TickKind::Minor,
                label: None,
            });
        }
        major_index += 1;
    }
    ticks
}

/// Label for a major tick: `M:SS` for long spans, tenths with a unit suffix
/// for sub-second steps, whole seconds otherwise.
pub fn tick_label(seconds: f64, major_step: f64) -> String {
    if major_step >= 60.0 || seconds >= 60.0 {
        let minutes = (seconds / 60.0).floor();
        let rest = (seconds - minutes * 60.0).round();
        return format!("{}:{:02}", minutes as u64, rest as u64);
    }
    if major_step < 1.0 {
        return format!("{seconds:.1}s");
    }
    format!("{}", seconds.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_zoom_uses_one_second_majors() {
        let steps = ruler_steps(120.0);
        assert_eq!(steps.major_seconds, 1.0);
        assert_eq!(steps.divisions, 4);
        assert_eq!(steps.minor_seconds, 0.25);
    }

    #[test]
    fn five_way_steps_split_in_five() {
        let steps = ruler_steps(12.0);
        assert_eq!(steps.major_seconds, 10.0);
        assert_eq!(steps.divisions, 5);
    }

    #[test]
    fn crowded_minors_are_reduced() {
        let steps = ruler_steps(30.0);
        assert_eq!(steps.major_seconds, 4.0);
        assert_eq!(steps.divisions, 4);

        let steps = ruler_steps(0.001);
        assert_eq!(steps.major_seconds, 600.0);
        assert_eq!(steps.divisions, 1);
    }

    #[test]
    fn ticks_cover_the_whole_timeline() {
        let ticks = ruler_ticks(4.5, 540.0);
        let majors: Vec<&RulerTick> = ticks.iter().filter(|t| t.kind == TickKind::Major).collect();
        assert_eq!(majors.len(), 5);
        assert_eq!(majors[4].x_px, 480.0);
        assert_eq!(majors[2].label.as_deref(), Some("2"));
        // Minors stop at the end of the timeline: 4.25 and 4.5 only after the last major.
        assert_eq!(ticks.len(), 5 + 4 * 3 + 2);
        assert!(ticks.iter().all(|t| t.kind == TickKind::Major || t.label.is_none()));
    }

    #[test]
    fn labels_switch_format_by_scale() {
        assert_eq!(tick_label(0.5, 0.5), "0.5s");
        assert_eq!(tick_label(12.0, 2.0), "12");
        assert_eq!(tick_label(75.0, 5.0), "1:15");
        assert_eq!(tick_label(120.0, 120.0), "2:00");
    }
}
