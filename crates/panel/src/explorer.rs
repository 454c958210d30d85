use crate::intent::PanelIntent;
use scenesync_common::{Axis, ObjectId};
use scenesync_store::Snapshot;

/// Range and granularity of a coordinate slider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderSpec {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for SliderSpec {
    fn default() -> Self {
        Self {
            min: -5.0,
            max: 5.0,
            step: 0.1,
        }
    }
}

impl SliderSpec {
    /// Bounds in order and finite. A NaN bound falls back to the default one.
    pub fn normalized(self) -> Self {
        let fallback = Self::default();
        let min = if self.min.is_nan() { fallback.min } else { self.min };
        let max = if self.max.is_nan() { fallback.max } else { self.max };
        Self {
            min: min.min(max),
            max: min.max(max),
            step: self.step,
        }
    }

    /// Clamp into range and round to the nearest step from `min`.
    pub fn snap(&self, value: f32) -> f32 {
        let Self { min, max, step } = self.normalized();
        if !value.is_finite() {
            return min.max(0.0).min(max);
        }
        let clamped = value.clamp(min, max);
        if step.is_nan() || step <= 0.0 {
            return clamped;
        }
        let steps = ((clamped - min) / step).round();
        (min + steps * step).clamp(min, max)
    }
}

/// One editable row: an object and its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelRow {
    pub id: ObjectId,
    pub position: [f32; 3],
}

impl PanelRow {
    pub fn value(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.position[0],
            Axis::Y => self.position[1],
            Axis::Z => self.position[2],
        }
    }
}

/// The "Explorer" panel: one slider row per object plus Add and Remove.
pub struct Explorer;

impl Explorer {
    /// Project a snapshot into rows, in insertion order.
    pub fn rows(snapshot: &Snapshot) -> Vec<PanelRow> {
        snapshot
            .iter()
            .map(|object| PanelRow {
                id: object.id,
                position: object.position.to_array(),
            })
            .collect()
    }

    /// Draw the panel and collect the intents the user produced this frame.
    pub fn show(ui: &mut egui::Ui, snapshot: &Snapshot, slider: SliderSpec) -> Vec<PanelIntent> {
        let mut intents = Vec::new();
        ui.heading("Explorer");

        for row in Self::rows(snapshot) {
            ui.push_id(row.id.0, |ui| {
                for axis in Axis::ALL {
                    let mut value = row.value(axis);
                    let changed = ui
                        .horizontal(|ui| {
                            ui.label(axis.label());
                            ui.add(
                                egui::Slider::new(&mut value, slider.min..=slider.max)
                                    .step_by(slider.step as f64),
                            )
                            .changed()
                        })
                        .inner;
                    if changed {
                        intents.push(PanelIntent::SetAxis {
                            id: row.id,
                            axis,
                            value,
                        });
                    }
                }
            });
            ui.add_space(10.0);
        }

        if ui.button("Add").clicked() {
            intents.push(PanelIntent::Add);
        }
        ui.add_space(20.0);
        if ui.button("Remove").clicked() {
            intents.push(PanelIntent::Remove);
        }
        intents
    }
}
