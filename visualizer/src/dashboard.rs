use dashcore::presentation::{Connectivity, DashboardView, Notification, Severity, SharedSink};
use dashcore::protocol::{DetectedEntityRecord, ExportFormat, MonitoringParameters, VisualizationMode};
use dashcore::{ControllerHandle, SessionState};
use iced::{
    time,
    widget::{button, canvas::Canvas, column, row, scrollable, text, text_input, Column, Container},
    Alignment, Color, Element, Length, Subscription, Task, Theme,
};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::widgets::{LocationPlot, ProgressGauge, Sparkline};

const REFRESH: Duration = Duration::from_millis(250);
const HISTORY: usize = 20;
const SPARKLINE_POINTS: usize = 120;
const TABLE_ROWS: usize = 200;

pub fn run(handle: ControllerHandle, sink: Arc<SharedSink>) -> iced::Result {
    iced::application(
        move || Dashboard::boot(handle.clone(), sink.clone()),
        Dashboard::update,
        Dashboard::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()
}

fn application_title(_: &Dashboard) -> String {
    "Monitoring Dashboard".into()
}

fn application_subscription(_: &Dashboard) -> Subscription<Message> {
    time::every(REFRESH).map(|_| Message::Tick)
}

fn application_theme(_: &Dashboard) -> Theme {
    Theme::Dark
}

struct Dashboard {
    handle: ControllerHandle,
    sink: Arc<SharedSink>,
    form: SessionForm,
    latest: DashboardView,
    packets: Vec<f32>,
    history: Vec<Notification>,
    busy: bool,
}

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    FieldChanged(Field, String),
    ModeSelected(VisualizationMode),
    Start,
    Stop,
    Reset,
    Export(ExportFormat),
    Settled(Result<Option<String>, String>),
}

#[derive(Debug, Clone, Copy)]
pub enum Field {
    Target,
    Operator,
    Duration,
}

impl Dashboard {
    fn boot(handle: ControllerHandle, sink: Arc<SharedSink>) -> (Self, Task<Message>) {
        (
            Dashboard {
                handle,
                sink,
                form: SessionForm::default(),
                latest: DashboardView::default(),
                packets: Vec::new(),
                history: Vec::new(),
                busy: false,
            },
            Task::none(),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                let view = state.sink.latest_view();
                state.absorb(view);
                for notification in state.sink.drain_notifications() {
                    state.push_history(notification);
                }
                Task::none()
            }
            Message::FieldChanged(field, value) => {
                state.form.update_field(field, value);
                Task::none()
            }
            Message::ModeSelected(mode) => {
                state.form.mode = mode;
                Task::none()
            }
            Message::Start => match state.form.to_parameters() {
                Ok(parameters) => {
                    state.busy = true;
                    let handle = state.handle.clone();
                    Task::perform(
                        async move {
                            handle
                                .request_start(parameters)
                                .await
                                .map(|_| None)
                                .map_err(|err| err.to_string())
                        },
                        Message::Settled,
                    )
                }
                Err(message) => {
                    state.push_history(Notification::warning(message));
                    Task::none()
                }
            },
            Message::Stop => {
                state.busy = true;
                let handle = state.handle.clone();
                Task::perform(
                    async move {
                        handle
                            .request_stop()
                            .await
                            .map(|_| None)
                            .map_err(|err| err.to_string())
                    },
                    Message::Settled,
                )
            }
            Message::Reset => {
                let handle = state.handle.clone();
                Task::perform(
                    async move { handle.reset().await.map(|_| None).map_err(|err| err.to_string()) },
                    Message::Settled,
                )
            }
            Message::Export(format) => {
                let handle = state.handle.clone();
                Task::perform(
                    async move {
                        handle
                            .request_export(format)
                            .await
                            .map(|path| Some(format!("Saved to {}", path.display())))
                            .map_err(|err| err.to_string())
                    },
                    Message::Settled,
                )
            }
            Message::Settled(result) => {
                state.busy = false;
                match result {
                    Ok(Some(detail)) => state.push_history(Notification::info(detail)),
                    Ok(None) => {}
                    // Already reported through the sink.
                    Err(err) => debug!("request settled with error: {}", err),
                }
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let view = &state.latest;
        let resting = view.state.is_resting();
        let mode = view
            .parameters
            .as_ref()
            .filter(|_| !resting)
            .map(|parameters| parameters.visualization_mode)
            .unwrap_or(state.form.mode);

        let form_column = column![
            text("Session").size(26),
            text_input("Target identifier", &state.form.target)
                .on_input(|value| Message::FieldChanged(Field::Target, value))
                .padding(6),
            text_input("Operator (optional)", &state.form.operator)
                .on_input(|value| Message::FieldChanged(Field::Operator, value))
                .padding(6),
            text_input("Duration (seconds)", &state.form.duration)
                .on_input(|value| Message::FieldChanged(Field::Duration, value))
                .padding(6),
            row![
                button("Map")
                    .on_press_maybe(resting.then_some(Message::ModeSelected(VisualizationMode::Map)))
                    .padding(8),
                button("Table")
                    .on_press_maybe(
                        resting.then_some(Message::ModeSelected(VisualizationMode::Table))
                    )
                    .padding(8),
                text(format!("View: {}", mode)).size(14),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
            row![
                button("Start")
                    .on_press_maybe((resting && !state.busy).then_some(Message::Start))
                    .padding(10),
                button("Stop")
                    .on_press_maybe(
                        (view.state == SessionState::Running && !state.busy)
                            .then_some(Message::Stop)
                    )
                    .padding(10),
                button("Reset")
                    .on_press_maybe(
                        matches!(view.state, SessionState::Completed | SessionState::Errored)
                            .then_some(Message::Reset)
                    )
                    .padding(10),
            ]
            .spacing(8),
            row![
                button("Export JSON")
                    .on_press(Message::Export(ExportFormat::Json))
                    .padding(8),
                button("Export CSV")
                    .on_press(Message::Export(ExportFormat::Csv))
                    .padding(8),
            ]
            .spacing(8),
            text("Notifications").size(18),
            Container::new(scrollable(notification_list(&state.history)).height(Length::Fixed(220.0)))
                .padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(360.0));

        let snapshot = &view.snapshot;
        let status_line = row![
            text(format!("State: {}", view.state)).size(18),
            text(view.connectivity.label())
                .size(16)
                .color(connectivity_color(view.connectivity)),
        ]
        .spacing(20);

        let progress = Canvas::new(ProgressGauge {
            fraction: (snapshot.clamped_progress() / 100.0) as f32,
        })
        .width(Length::Fill)
        .height(Length::Fixed(18.0));

        let counters = row![
            text(format!("Entities: {}", snapshot.detected_entity_count)).size(16),
            text(format!("Locations: {}", snapshot.location_count)).size(16),
            text(format!("Packets: {}", snapshot.packets_analyzed)).size(16),
            text(format!("Cells: {}", snapshot.unique_cell_count)).size(16),
        ]
        .spacing(18);

        let results: Element<'_, Message> = match mode {
            VisualizationMode::Map => Canvas::new(LocationPlot::new(&view.records))
                .width(Length::Fill)
                .height(Length::Fixed(300.0))
                .into(),
            VisualizationMode::Table => {
                Container::new(scrollable(record_table(&view.records)).height(Length::Fixed(300.0)))
                    .padding(6)
                    .into()
            }
        };

        let summary = match &view.summary {
            Some(summary) => text(format!(
                "Monitored {} | detected {} | locations {} | success {:.1}%",
                summary.total_monitored,
                summary.total_detected,
                summary.total_locations,
                summary.success_rate
            ))
            .size(14),
            None => text("No summary yet").size(14),
        };

        let mut telemetry_column = column![
            text("Monitoring").size(26),
            status_line,
            text(format!(
                "{:.0}% - {}",
                snapshot.clamped_progress(),
                if snapshot.current_operation_label.is_empty() {
                    "waiting"
                } else {
                    snapshot.current_operation_label.as_str()
                }
            ))
            .size(14),
            progress,
            counters,
            text("Packets analysed").size(16),
            Canvas::new(Sparkline {
                data: state.packets.clone(),
            })
            .width(Length::Fill)
            .height(Length::Fixed(120.0)),
            text(format!("Results ({})", view.records.len())).size(16),
            results,
            summary,
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fill);

        if let Some(error) = &view.last_error {
            telemetry_column = telemetry_column
                .push(text(format!("Last error: {error}")).size(14).color(Color::from_rgb(0.9, 0.3, 0.3)));
        }

        let layout = row![form_column, telemetry_column]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn absorb(&mut self, view: DashboardView) {
        if view.state == SessionState::Starting {
            self.packets.clear();
        }
        if view.state == SessionState::Running
            && self.latest.snapshot.packets_analyzed != view.snapshot.packets_analyzed
        {
            self.packets.push(view.snapshot.packets_analyzed as f32);
            if self.packets.len() > SPARKLINE_POINTS {
                self.packets.remove(0);
            }
        }
        self.latest = view;
    }

    fn push_history(&mut self, entry: Notification) {
        self.history.push(entry);
        if self.history.len() > HISTORY {
            self.history.remove(0);
        }
    }
}

fn notification_list(history: &[Notification]) -> Column<'_, Message> {
    if history.is_empty() {
        return Column::new().push(text("No activity yet").size(12));
    }
    history
        .iter()
        .rev()
        .fold(Column::new().spacing(4), |col, entry| {
            col.push(text(entry.message.clone()).size(13).color(severity_color(entry.severity)))
        })
}

fn record_table(records: &[DetectedEntityRecord]) -> Column<'_, Message> {
    if records.is_empty() {
        return Column::new().push(text("No detections yet").size(12));
    }
    let header = text("identifier | observed | lat, lon | distance").size(13);
    records
        .iter()
        .take(TABLE_ROWS)
        .fold(Column::new().spacing(4).push(header), |col, record| {
            col.push(
                text(format!(
                    "{} | {} | {:.4}, {:.4} | {:.2} km",
                    record.identifier,
                    record.observed_at.format("%H:%M:%S"),
                    record.coordinates.lat,
                    record.coordinates.lon,
                    record.approximate_distance_km
                ))
                .size(12),
            )
        })
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::from_rgb(0.7, 0.75, 0.8),
        Severity::Warning => Color::from_rgb(0.95, 0.75, 0.25),
        Severity::Success => Color::from_rgb(0.3, 0.8, 0.45),
        Severity::Error => Color::from_rgb(0.9, 0.3, 0.3),
    }
}

fn connectivity_color(status: Connectivity) -> Color {
    match status {
        Connectivity::Connected => Color::from_rgb(0.3, 0.8, 0.45),
        Connectivity::Disconnected => Color::from_rgb(0.9, 0.3, 0.3),
        Connectivity::Unknown => Color::from_rgb(0.6, 0.6, 0.6),
    }
}

/// Raw text of the parameter form.
#[derive(Debug, Clone)]
struct SessionForm {
    target: String,
    operator: String,
    duration: String,
    mode: VisualizationMode,
}

impl Default for SessionForm {
    fn default() -> Self {
        Self {
            target: String::new(),
            operator: String::new(),
            duration: "60".into(),
            mode: VisualizationMode::Map,
        }
    }
}

impl SessionForm {
    fn update_field(&mut self, field: Field, value: String) {
        match field {
            Field::Target => self.target = value,
            Field::Operator => self.operator = value,
            Field::Duration => self.duration = value,
        }
    }

    fn to_parameters(&self) -> Result<MonitoringParameters, String> {
        let duration = self
            .duration
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("duration must be a whole number of seconds, got '{}'", self.duration))?;
        let parameters = MonitoringParameters::new(
            self.target.trim(),
            self.operator.trim(),
            duration,
            self.mode,
        );
        parameters.validate().map_err(|err| err.to_string())?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashcore::protocol::ProgressSnapshot;

    #[test]
    fn form_trims_and_parses() {
        let mut form = SessionForm::default();
        form.update_field(Field::Target, "  X ".into());
        form.update_field(Field::Duration, " 90".into());
        let parameters = form.to_parameters().unwrap();
        assert_eq!(parameters.target_identifier, "X");
        assert_eq!(parameters.duration_seconds, 90);
        assert_eq!(parameters.operator_filter, "");
    }

    #[test]
    fn form_rejects_a_bad_duration() {
        let mut form = SessionForm::default();
        form.update_field(Field::Target, "X".into());
        form.update_field(Field::Duration, "soon".into());
        assert!(form.to_parameters().unwrap_err().contains("soon"));
        form.update_field(Field::Duration, "0".into());
        assert!(form.to_parameters().is_err());
    }

    #[test]
    fn sparkline_tracks_packets_while_running() {
        let mut dashboard = test_dashboard();
        for packets in [100, 100, 250] {
            dashboard.absorb(DashboardView {
                state: SessionState::Running,
                snapshot: ProgressSnapshot {
                    packets_analyzed: packets,
                    ..Default::default()
                },
                ..Default::default()
            });
        }
        assert_eq!(dashboard.packets, vec![100.0, 250.0]);

        dashboard.absorb(DashboardView {
            state: SessionState::Starting,
            ..Default::default()
        });
        assert!(dashboard.packets.is_empty());
    }

    fn test_dashboard() -> Dashboard {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let (transport, _backend) = dashcore::transport::memory::pair();
        let sink = Arc::new(SharedSink::new());
        let handle = dashcore::Controller::spawn(
            Arc::new(transport),
            sink.clone(),
            Arc::new(dashcore::export::DirectorySaver::new(std::env::temp_dir())),
            &dashcore::ClientConfig::default(),
        );
        Dashboard::boot(handle, sink).0
    }
}
