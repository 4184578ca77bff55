use super::visuals::{Rgb, VisualSettings};
use crate::midi::Score;

const BLACK_KEY_WIDTH: f32 = 0.6;
const BLACK_KEY_HEIGHT: f32 = 0.62;
const KEY_GAP: f32 = 0.08;

/// Axis aligned rectangle in normalized window space, origin top left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub color: [f32; 4],
}

impl Rect {
    fn new(min: [f32; 2], max: [f32; 2], color: Rgb) -> Self {
        Self {
            min,
            max,
            color: [color[0], color[1], color[2], 1.0],
        }
    }
}

pub fn is_black(key: u8) -> bool {
    matches!(key % 12, 1 | 3 | 6 | 8 | 10)
}

#[derive(Clone, Copy, Debug)]
pub struct Keyboard {
    min_key: u8,
    max_key: u8,
    white_width: f32,
}

impl Keyboard {
    pub fn new(min_key: u8, max_key: u8) -> Self {
        let whites =
            (min_key..=max_key).filter(|key| !is_black(*key)).count();
        Self {
            min_key,
            max_key,
            white_width: 1.0 / whites.max(1) as f32,
        }
    }

    pub fn contains(&self, key: u8) -> bool {
        (self.min_key..=self.max_key).contains(&key)
    }

    /// Horizontal extent of a key, or None when it is out of range.
    pub fn span(&self, key: u8) -> Option<(f32, f32)> {
        if !self.contains(key) {
            return None;
        }

        let whites_before = (self.min_key..key)
            .filter(|key| !is_black(*key))
            .count() as f32;
        let left = whites_before * self.white_width;

        if is_black(key) {
            let half = self.white_width * BLACK_KEY_WIDTH * 0.5;
            Some((left - half, left + half))
        } else {
            Some((left, left + self.white_width))
        }
    }
}

/// Falling notes above a keyboard, in drawing order.
pub fn build(score: &Score, time: f32, settings: &VisualSettings) -> Vec<Rect> {
    let keyboard = Keyboard::new(settings.min_key, settings.max_key);
    let keyboard_top = if settings.show_keyboard {
        1.0 - settings.keyboard_size
    } else {
        1.0
    };
    let preroll = settings.preroll.max(f32::EPSILON);
    let to_y = |t: f32| keyboard_top - (t - time) / preroll * keyboard_top;

    let mut rects = Vec::new();
    let mut pressed = [None::<Rgb>; 128];

    for note in score.window(time, time + preroll) {
        let Some((left, right)) = keyboard.span(note.key) else {
            continue;
        };

        let color = if is_black(note.key) {
            settings.note_minor
        } else {
            settings.note_major
        };

        if note.is_sounding(time) {
            pressed[usize::from(note.key)] = Some(color);
        }

        let top = to_y(note.end).max(0.0);
        let bottom = to_y(note.start).min(keyboard_top);
        if bottom > top {
            let inset = (right - left) * KEY_GAP * 0.5;
            rects.push(Rect::new(
                [left + inset, top],
                [right - inset, bottom],
                color,
            ));
        }
    }

    if settings.show_keyboard && settings.keyboard_size > 0.0 {
        push_keys(&mut rects, &keyboard, keyboard_top, &pressed, settings);
    }

    rects
}

fn push_keys(
    rects: &mut Vec<Rect>,
    keyboard: &Keyboard,
    top: f32,
    pressed: &[Option<Rgb>; 128],
    settings: &VisualSettings,
) {
    let black_bottom = top + (1.0 - top) * BLACK_KEY_HEIGHT;

    for black in [false, true] {
        for key in settings.min_key..=settings.max_key {
            if is_black(key) != black {
                continue;
            }
            let Some((left, right)) = keyboard.span(key) else {
                continue;
            };

            let idle = if black {
                settings.key_minor
            } else {
                settings.key_major
            };
            let color = pressed[usize::from(key)].unwrap_or(idle);
            let bottom = if black { black_bottom } else { 1.0 };
            let gap = if black {
                0.0
            } else {
                (right - left) * KEY_GAP * 0.5
            };

            rects.push(Rect::new(
                [left + gap, top],
                [right - gap, bottom],
                color,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::Note;

    fn score(notes: &[(f32, f32, u8)]) -> Score {
        Score::from_notes(
            notes
                .iter()
                .map(|&(start, end, key)| Note {
                    start,
                    end,
                    key,
                    velocity: 100,
                    track: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn black_keys_sit_between_white_keys() {
        let keyboard = Keyboard::new(60, 64);
        let (c_left, c_right) = keyboard.span(60).unwrap();
        let (cs_left, cs_right) = keyboard.span(61).unwrap();
        let (d_left, _) = keyboard.span(62).unwrap();

        assert_eq!(c_left, 0.0);
        assert!((c_right - 1.0 / 3.0).abs() < 1e-6);
        assert!(cs_left < c_right && cs_right > d_left);
        assert!(keyboard.span(65).is_none());
    }

    #[test]
    fn notes_outside_the_preroll_are_culled() {
        let settings = VisualSettings {
            preroll: 2.0,
            show_keyboard: false,
            ..VisualSettings::default()
        };
        let score = score(&[(0.0, 0.5, 60), (1.0, 1.5, 62), (5.0, 6.0, 64)]);

        assert_eq!(build(&score, 0.0, &settings).len(), 2);
        assert_eq!(build(&score, 1.0, &settings).len(), 1);
        assert!(build(&score, 7.0, &settings).is_empty());
    }

    #[test]
    fn sounding_notes_highlight_their_key() {
        let settings = VisualSettings {
            min_key: 60,
            max_key: 62,
            ..VisualSettings::default()
        };
        let score = score(&[(0.0, 1.0, 60)]);

        let rects = build(&score, 0.5, &settings);
        let note_color = [
            settings.note_major[0],
            settings.note_major[1],
            settings.note_major[2],
            1.0,
        ];

        // One note plus three keys.
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[1].color, note_color);
        assert_ne!(rects[2].color, note_color);
    }

    #[test]
    fn note_bottom_reaches_the_keyboard_when_it_starts() {
        let settings = VisualSettings {
            keyboard_size: 0.2,
            ..VisualSettings::default()
        };
        let score = score(&[(1.0, 2.0, 60)]);

        let rects = build(&score, 1.0, &settings);
        assert!((rects[0].max[1] - 0.8).abs() < 1e-6);
    }
}
