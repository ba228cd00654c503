use super::ReportUploader;
use crate::upload::format_size;
use eframe::egui::{self, Align, Color32, RichText};

const ACCENT: Color32 = Color32::from_rgb(79, 70, 229);
const SUCCESS: Color32 = Color32::from_rgb(34, 197, 94);
const ERROR: Color32 = Color32::from_rgb(239, 68, 68);

impl ReportUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        let view = self.form.view();

        egui::CentralPanel::default().show(ctx, |ui| {
            let footer_height = 40.0;
            let content_height = ui.available_height() - footer_height;

            egui::ScrollArea::vertical()
                .max_height(content_height)
                .show(ui, |ui| {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Generate Anomaly Detection Report");
                        ui.add_space(5.0);
                        ui.label(
                            RichText::new("Upload an Excel workbook to receive a PDF report")
                                .color(ui.visuals().text_color().gamma_multiply(0.7)),
                        );
                    });

                    ui.add_space(20.0);

                    ui.vertical_centered(|ui| {
                        let picker = egui::Button::new(
                            RichText::new(format!("📄 {}", view.picker_label)).color(Color32::WHITE),
                        )
                        .fill(ACCENT)
                        .min_size(egui::vec2(280.0, 40.0));
                        if ui.add(picker).on_hover_text("Accepted: .xlsx, .xls").clicked() {
                            self.choose_file();
                        }
                        if let Some(size) = view.file_size {
                            ui.label(
                                RichText::new(format_size(size))
                                    .small()
                                    .color(ui.visuals().text_color().gamma_multiply(0.6)),
                            );
                        }

                        if let Some(error) = &view.error {
                            ui.add_space(8.0);
                            ui.colored_label(ERROR, error);
                        }

                        ui.add_space(16.0);

                        let submit = if view.busy {
                            egui::Button::new("")
                        } else {
                            egui::Button::new(RichText::new(view.submit_label()).color(Color32::WHITE))
                                .fill(SUCCESS)
                        }
                        .min_size(egui::vec2(280.0, 40.0));

                        let response = ui.add_enabled(view.submit_enabled, submit);
                        if view.busy {
                            // Spinner drawn on top of the disabled button.
                            let spinner_rect = egui::Rect::from_center_size(
                                response.rect.center(),
                                egui::vec2(20.0, 20.0),
                            );
                            ui.put(spinner_rect, egui::Spinner::new());
                        } else if response.clicked() {
                            self.submit();
                        }
                    });

                    if let Some(link) = &view.download {
                        ui.add_space(24.0);
                        ui.group(|ui| {
                            ui.vertical_centered(|ui| {
                                ui.label(RichText::new("Report Generated Successfully!").strong().size(18.0));
                                ui.add_space(8.0);
                                ui.horizontal(|ui| {
                                    let download = egui::Button::new(
                                        RichText::new("⬇ Download PDF Report").color(Color32::WHITE),
                                    )
                                    .fill(SUCCESS);
                                    if ui
                                        .add(download)
                                        .on_hover_text(format!("Save as {}", link.file_name))
                                        .clicked()
                                    {
                                        self.download_report();
                                    }
                                    if ui.button("Open Report").clicked() {
                                        self.open_report();
                                    }
                                });
                                ui.label(
                                    RichText::new(format!("{} · {}", link.file_name, format_size(link.size)))
                                        .small()
                                        .color(ui.visuals().text_color().gamma_multiply(0.6)),
                                );
                            });
                        });
                    }

                    if let Some(note) = &view.note {
                        ui.add_space(10.0);
                        ui.vertical_centered(|ui| {
                            ui.label(RichText::new(note).italics());
                        });
                    }

                    if view.download.is_some() || view.error.is_some() || view.file_size.is_some() {
                        ui.add_space(10.0);
                        ui.vertical_centered(|ui| {
                            // Disabled while busy: clearing mid-request would act as a cancel button.
                            if ui.add_enabled(!view.busy, egui::Button::new("🗑 Clear")).clicked() {
                                self.reset();
                            }
                        });
                    }
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(10.0);
                self.render_footer(ui);
            });
        });
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        ui.label(
            RichText::new(format!("Backend: {}", self.endpoint))
                .small()
                .color(ui.visuals().text_color().gamma_multiply(0.5)),
        );
    }
}
