use iced::widget::{column, container, image, row, slider, text};
use iced::{Alignment, ContentFit, Element, Length};
use std::time::Instant;

use crate::state::controller::{SampleViewController, Status};
use crate::state::data::StepRecord;

/// Chart card size in logical pixels
const CHART_WIDTH: f32 = 430.0;
const CHART_HEIGHT: f32 = 384.0;

/// Card for one chart: tag and run, step slider, and the current sample
///
/// `on_change` fires for every slider movement, `on_release` once the
/// slider is let go.
pub fn sample_chart<'a, Message: Clone + 'a>(
    controller: &'a SampleViewController,
    fit: bool,
    now: Instant,
    on_change: impl Fn(usize) -> Message + 'a,
    on_release: Message,
) -> Element<'a, Message> {
    let (tag, run) = controller
        .session()
        .map(|session| (session.tag.as_str(), session.run.as_str()))
        .unwrap_or_default();
    let display = controller.current_display(now);
    let model = controller.slider();

    let header = row![
        text(tag).size(16).width(Length::Fill),
        text(run).size(14),
    ]
    .align_y(Alignment::Center);

    let mut label = step_label(display.record);
    if display.status == Status::Ready && display.error.is_some() {
        label.push_str(" - failed to load, showing previous sample");
    }

    let steps = slider(
        model.min as u32..=model.max as u32,
        model.current as u32,
        move |value| on_change(value as usize),
    )
    .step(1u32)
    .on_release(on_release);

    let content: Element<'a, Message> = match (display.status, display.image) {
        (Status::Ready, Some(handle)) => image(handle.clone())
            .content_fit(if fit { ContentFit::Contain } else { ContentFit::ScaleDown })
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        (Status::Error, _) => match display.error {
            Some(err) => text(format!("Error: {}", err)).into(),
            None => text("Error").into(),
        },
        (Status::Empty, _) => text("No samples").into(),
        _ => text("Loading...").into(),
    };

    container(
        column![
            header,
            text(label).size(12),
            steps,
            container(content)
                .center_x(Length::Fill)
                .center_y(Length::Fill),
        ]
        .spacing(10),
    )
    .width(Length::Fixed(CHART_WIDTH))
    .height(Length::Fixed(CHART_HEIGHT))
    .padding(20)
    .style(container::bordered_box)
    .into()
}

/// "Step: 10 (2020-09-13 12:26:40)", or "Step: ..." while unknown
pub fn step_label(record: Option<StepRecord>) -> String {
    match record {
        Some(record) => match record.logged_at() {
            Some(at) => format!("Step: {} ({})", record.step, at.format("%Y-%m-%d %H:%M:%S")),
            None => format!("Step: {}", record.step),
        },
        None => "Step: ...".to_string(),
    }
}
