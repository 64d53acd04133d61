use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{battery::simulator::SocEntry, point::ChargePoint},
    quantity::{Zero, energy::WattHours, rate::KilowattHourRate},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

#[must_use]
pub fn build_projection_table(entries: &[SocEntry]) -> Table {
    let mean_rate = {
        let simulated: Vec<_> =
            entries.iter().filter(|entry| entry.rate != KilowattHourRate::ZERO).collect();
        if simulated.is_empty() {
            KilowattHourRate::ZERO
        } else {
            #[expect(clippy::cast_precision_loss)]
            let count = simulated.len() as f64;
            KilowattHourRate(
                simulated.iter().map(|entry| entry.rate.0).sum::<f64>() / count,
            )
        }
    };

    let mut table = new_table();
    table.set_header(vec!["Date", "Start", "Rate", "PV", "Use", "Grid", "Level", "SOC"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(entry.start.format("%H:%M")),
            Cell::new(entry.rate).fg(if entry.rate >= mean_rate {
                Color::Red
            } else {
                Color::Green
            }),
            Cell::new(entry.pv).set_alignment(CellAlignment::Right),
            Cell::new(entry.consumption)
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(entry.grid).set_alignment(CellAlignment::Right).fg(
                if entry.grid > WattHours::ZERO {
                    Color::Red
                } else {
                    Color::Green
                },
            ),
            Cell::new(entry.level).set_alignment(CellAlignment::Right),
            Cell::new(entry.soc).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[must_use]
pub fn build_plan_table(points: &[ChargePoint]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Start", "Energy", "Power", "Rate", "Covers", "Target SOC"]);
    for point in points {
        table.add_row(vec![
            Cell::new(point.start.format("%b %d %H:%M")),
            Cell::new(point.energy).set_alignment(CellAlignment::Right).fg(Color::Green),
            Cell::new(point.power).set_alignment(CellAlignment::Right),
            Cell::new(point.rate),
            Cell::new(format!("slot {}", point.covers_index)).add_attribute(Attribute::Dim),
            Cell::new(point.target_soc).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
