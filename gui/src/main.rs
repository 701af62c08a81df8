//! Minimal desktop front end (§6): a read-only gallery of images this node
//! owns, plus the three commands that mutate state — mint, transfer, fetch
//! — all driven through the same [`imgchain_node::Node`] the console client
//! uses. There is no RPC hop: the GUI calls straight into the in-process
//! node, unlike the teacher's wallet stub which talked to a JSON-RPC
//! service this domain has no counterpart for (see DESIGN.md).

use clap::Parser;
use eframe::{egui, NativeOptions};
use imgchain_core::{Config, ImageId, UserId};
use imgchain_node::tracker::LoginPrompts;
use imgchain_node::{MintOutcome, Node, TransferOutcome};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgchain-gui")]
#[command(about = "Desktop client for the imgchain peer-to-peer network", version)]
struct Args {
    listen_port: u16,
    tracker_host: String,
    tracker_port: u16,
}

/// A GUI has no terminal to prompt through before its window exists, so a
/// fresh identity is generated automatically and a returning one is always
/// accepted; there is no analog of the console client's Y/N prompt here.
struct AutoPrompts;

impl LoginPrompts for AutoPrompts {
    fn prompt_new_username(&self) -> String {
        format!("guest-{}", &UserId::random().as_str()[..6])
    }

    fn confirm_returning_user(&self, _username: &str) -> bool {
        true
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let tracker_addr = resolve(&args.tracker_host, args.tracker_port);

    let running = match imgchain_node::bootstrap_and_run(args.listen_port, tracker_addr, &AutoPrompts, Config::default())
    {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %e, "failed to start node");
            std::process::exit(1);
        }
    };

    let app = GalleryApp::new(running.node.clone());
    eframe::run_native("imgchain", NativeOptions::default(), Box::new(|_cc| Box::new(app)))
}

fn resolve(host: &str, port: u16) -> SocketAddr {
    if let Ok(addr) = format!("{host}:{port}").parse() {
        return addr;
    }
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .unwrap_or_else(|| {
            eprintln!("could not resolve tracker host {host}");
            std::process::exit(1);
        })
}

struct GalleryApp {
    node: Arc<Node>,
    mint_path: String,
    transfer_image_id: String,
    transfer_recipient: String,
    fetch_image_id: String,
    fetch_out_path: String,
    status: String,
}

impl GalleryApp {
    fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            mint_path: String::new(),
            transfer_image_id: String::new(),
            transfer_recipient: String::new(),
            fetch_image_id: String::new(),
            fetch_out_path: String::new(),
            status: String::new(),
        }
    }
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("imgchain");
            ui.label(format!(
                "user_id={} username={}",
                self.node.identity.user_id, self.node.identity.username
            ));
            ui.separator();

            ui.heading("Mint");
            ui.horizontal(|ui| {
                ui.label("File path");
                ui.text_edit_singleline(&mut self.mint_path);
                if ui.button("Mint").clicked() {
                    self.status = match std::fs::read(&self.mint_path) {
                        Ok(bytes) => match self.node.create_nft(bytes) {
                            MintOutcome::Minted(id) => format!("minted {id}"),
                            MintOutcome::AlreadyOwned { image_id, owner } => {
                                format!("already owned: {image_id} by {owner}")
                            }
                        },
                        Err(e) => format!("read failed: {e}"),
                    };
                }
            });

            ui.heading("Transfer");
            ui.horizontal(|ui| {
                ui.label("Image id");
                ui.text_edit_singleline(&mut self.transfer_image_id);
                ui.label("Recipient");
                ui.text_edit_singleline(&mut self.transfer_recipient);
                if ui.button("Transfer").clicked() {
                    self.status = match (
                        ImageId::parse(&self.transfer_image_id),
                        UserId::parse(&self.transfer_recipient),
                    ) {
                        (Ok(image_id), Ok(recipient)) => match self.node.transfer_nft(image_id, recipient) {
                            TransferOutcome::Transferred => "transferred".to_string(),
                            TransferOutcome::NotOwner(owner) => format!("not the owner, current owner is {owner}"),
                        },
                        _ => "invalid image id or recipient id".to_string(),
                    };
                }
            });

            ui.heading("Fetch");
            ui.horizontal(|ui| {
                ui.label("Image id");
                ui.text_edit_singleline(&mut self.fetch_image_id);
                ui.label("Save to");
                ui.text_edit_singleline(&mut self.fetch_out_path);
                if ui.button("Fetch").clicked() {
                    self.status = match ImageId::parse(&self.fetch_image_id) {
                        Ok(image_id) => match self.node.get_image(&image_id) {
                            Some(bytes) => match std::fs::write(&self.fetch_out_path, &bytes) {
                                Ok(()) => format!("wrote {} bytes", bytes.len()),
                                Err(e) => format!("write failed: {e}"),
                            },
                            None => "not found locally or on any known peer".to_string(),
                        },
                        Err(_) => "invalid image id".to_string(),
                    };
                }
            });

            if !self.status.is_empty() {
                ui.separator();
                ui.label(&self.status);
            }

            ui.separator();
            ui.heading("Owned images");
            let images = self.node.lock_state().chain.find_images_of(&self.node.identity.user_id);
            egui::ScrollArea::vertical().show(ui, |ui| {
                for image_id in images {
                    ui.label(image_id.to_string());
                }
            });
        });
    }
}
