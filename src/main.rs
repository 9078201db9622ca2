//! `gfxtool` - list, extract and edit tiles in DOS game graphics files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use clap::Parser;
use dosgfx_rs::dosgfx_types::prelude::*;
use dosgfx_rs::dosgfx_types::util::default_palette_for;
use log::warn;

/// Exit code for bad command-line arguments.
const EXIT_BAD_ARGS: u8 = 1;
/// Exit code when the main file cannot be opened.
const EXIT_NO_OPEN: u8 = 2;
/// Exit code when the file type is ambiguous and `--type` is required.
const EXIT_AMBIGUOUS: u8 = 3;
/// Exit code for non-critical failures (e.g. an ID that does not exist).
const EXIT_SOFT_FAIL: u8 = 4;
/// Exit code for partial failures reported by the format layer.
const EXIT_PARTIAL: u8 = 5;

#[derive(Parser)]
#[command(name = "gfxtool", about = "Manipulate DOS game tileset files", version)]
struct Cli {
	/// Tileset file to operate on
	file: Option<PathBuf>,

	/// List the contents of the file
	#[arg(short = 'l', long)]
	list: bool,

	/// Extract a tile's pixel data: ID or ID=path
	#[arg(short = 'x', long, value_name = "ID[=PATH]")]
	extract: Option<String>,

	/// Render a tile as coloured text: ID
	#[arg(short = 'p', long, value_name = "ID")]
	print: Option<String>,

	/// Resize a tile or tileset: ID=WxH
	#[arg(short = 'z', long, value_name = "ID=WxH")]
	set_size: Option<String>,

	/// Insert an empty image before the given ID
	#[arg(short = 'i', long, value_name = "ID")]
	insert_image: Option<String>,

	/// Skip automatic detection and use this format code
	#[arg(short = 't', long, value_name = "CODE")]
	r#type: Option<String>,

	/// Open the file even when detection rejects it
	#[arg(short = 'f', long)]
	force: bool,

	/// Attach a palette file for formats that need one
	#[arg(long, value_name = "PATH")]
	palette: Option<PathBuf>,

	/// Tiles per row when printing
	#[arg(short = 'w', long, default_value_t = 0)]
	width: u32,

	/// List every supported format and exit
	#[arg(long)]
	list_types: bool,
}

/// A dotted entry path with an optional trailing image index,
/// e.g. `0.3.1` or `0.3+7`.
struct Id {
	folders: Vec<usize>,
	image: Option<usize>,
}

fn parse_id(text: &str) -> anyhow::Result<Id> {
	let (path, image) = match text.split_once('+') {
		Some((p, img)) => (p, Some(img.parse().context("bad image index")?)),
		None => (text, None),
	};
	let mut folders = Vec::new();
	if !path.is_empty() {
		for part in path.split('.') {
			// Every character must be a digit; anything else is a typo, not
			// an entry number.
			if part.is_empty() || !part.bytes().all(|c| c.is_ascii_digit()) {
				return Err(anyhow!("invalid ID component {part:?}"));
			}
			folders.push(part.parse()?);
		}
	}
	Ok(Id {
		folders,
		image,
	})
}

fn main() -> ExitCode {
	env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(e) => {
			let _ = e.print();
			return ExitCode::from(EXIT_BAD_ARGS);
		}
	};

	match run(&cli) {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:#}");
			ExitCode::from(EXIT_PARTIAL)
		}
	}
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
	let registry = Registry::new();

	if cli.list_types {
		for fmt in registry.image_formats() {
			println!("{:20} {}", fmt.code(), fmt.friendly_name());
		}
		for fmt in registry.tileset_formats() {
			println!("{:20} {}", fmt.code(), fmt.friendly_name());
		}
		return Ok(ExitCode::SUCCESS);
	}

	let Some(file) = cli.file.as_deref() else {
		eprintln!("error: no input file given");
		return Ok(ExitCode::from(EXIT_BAD_ARGS));
	};

	let content = match FileStream::open(file) {
		Ok(s) => shared(s),
		Err(e) => {
			eprintln!("error: {e}");
			return Ok(ExitCode::from(EXIT_NO_OPEN));
		}
	};

	let format = match cli.r#type.as_deref() {
		Some(code) => registry
			.tileset_by_code(code)
			.ok_or_else(|| anyhow!("unknown format code {code:?} (see --list-types)"))?,
		None => {
			let detected = {
				let mut io = content.borrow_mut();
				registry.detect_tileset(&mut *io)?
			};
			match detected {
				Some(f) => f,
				None if cli.force => registry
					.tileset_formats()
					.first()
					.cloned()
					.ok_or_else(|| anyhow!("no formats registered"))?,
				None => {
					eprintln!(
						"error: unable to determine the file type; pass --type (see --list-types)"
					);
					return Ok(ExitCode::from(EXIT_AMBIGUOUS));
				}
			}
		}
	};

	let supp = open_supps(&*format, file, cli.palette.as_deref())?;
	let mut root = format
		.open(content, &supp)
		.with_context(|| format!("opening {} as {}", file.display(), format.code()))?;

	let mut soft_fail = false;

	if cli.list {
		if let Err(e) = list_tileset(root.as_ref(), &mut Vec::new()) {
			// Listing keeps going on damaged entries; report and move on.
			warn!("listing incomplete: {e}");
			soft_fail = true;
		}
	}

	if let Some(spec) = cli.extract.as_deref() {
		let (id, dest) = split_assignment(spec);
		match extract_tile(root.as_ref(), id, dest) {
			Ok(path) => println!("extracted {id} to {path}"),
			Err(e) => {
				eprintln!("error: cannot extract {id}: {e:#}");
				return Ok(ExitCode::from(EXIT_SOFT_FAIL));
			}
		}
	}

	if let Some(id) = cli.print.as_deref() {
		match print_tile(root.as_ref(), id, cli.width) {
			Ok(()) => {}
			Err(e) => {
				eprintln!("error: cannot print {id}: {e:#}");
				return Ok(ExitCode::from(EXIT_SOFT_FAIL));
			}
		}
	}

	if let Some(spec) = cli.set_size.as_deref() {
		let (id, size) = split_assignment(spec);
		let size = size.ok_or_else(|| anyhow!("--set-size needs ID=WxH"))?;
		let (w, h) = size
			.split_once('x')
			.ok_or_else(|| anyhow!("--set-size needs ID=WxH"))?;
		set_size(root.as_mut(), id, Point::new(w.parse()?, h.parse()?))?;
		root.flush()?;
		println!("resized {id} to {size}");
	}

	if let Some(id) = cli.insert_image.as_deref() {
		insert_image(root.as_mut(), id)?;
		root.flush()?;
		println!("inserted image at {id}");
	}

	if soft_fail {
		return Ok(ExitCode::from(EXIT_PARTIAL));
	}
	Ok(ExitCode::SUCCESS)
}

fn open_supps(
	format: &dyn TilesetFormat,
	file: &Path,
	palette_override: Option<&Path>,
) -> anyhow::Result<SuppData> {
	let mut supp = SuppData::new();
	if let Some(path) = palette_override {
		supp.insert(SuppKind::Palette, shared(FileStream::open(path)?));
		return Ok(supp);
	}

	let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
	for (kind, name) in format.required_supps(filename) {
		let path = file.with_file_name(&name);
		match FileStream::open(&path) {
			Ok(s) => {
				supp.insert(kind, shared(s));
			}
			Err(e) => warn!("supplementary file {name} not found: {e}"),
		}
	}
	Ok(supp)
}

fn split_assignment(spec: &str) -> (&str, Option<&str>) {
	match spec.split_once('=') {
		Some((id, value)) => (id, Some(value)),
		None => (spec, None),
	}
}

fn list_tileset(tileset: &dyn Tileset, path: &mut Vec<usize>) -> anyhow::Result<()> {
	for entry in tileset.entries() {
		let (index, attr, size, tag) = {
			let e = entry.borrow();
			(e.index, e.attr, e.stored_size, e.type_tag.clone())
		};
		path.push(index);
		let id = path.iter().map(usize::to_string).collect::<Vec<_>>().join(".");
		if attr.contains(Attributes::VACANT) {
			println!("{id:12} (vacant)");
		} else if attr.contains(Attributes::FOLDER) {
			println!("{id:12} folder  {size:8} bytes  {tag}");
			match tileset.open_tileset(&entry) {
				Ok(sub) => list_tileset(sub.as_ref(), path)?,
				Err(e) => warn!("cannot descend into {id}: {e}"),
			}
		} else {
			println!("{id:12} image   {size:8} bytes  {tag}");
		}
		path.pop();
	}
	Ok(())
}

/// Walk folder components down from the root.
fn descend(root: &dyn Tileset, folders: &[usize]) -> anyhow::Result<Option<Box<dyn Tileset>>> {
	let mut current: Option<Box<dyn Tileset>> = None;
	for &index in folders {
		let tileset: &dyn Tileset = current.as_deref().unwrap_or(root);
		let entry = tileset
			.entries()
			.get(index)
			.cloned()
			.ok_or_else(|| anyhow!("no entry {index}"))?;
		current = Some(tileset.open_tileset(&entry)?);
	}
	Ok(current)
}

/// Interpret an ID as naming an image: either `PATH+N`, or a dotted path
/// whose final component is the image's position.
fn image_position(id: &Id) -> anyhow::Result<(&[usize], usize)> {
	match id.image {
		Some(n) => Ok((&id.folders, n)),
		None => {
			let (last, folders) =
				id.folders.split_last().ok_or_else(|| anyhow!("ID names no image"))?;
			Ok((folders, *last))
		}
	}
}

fn open_image_at(root: &dyn Tileset, text: &str) -> anyhow::Result<Box<dyn Image>> {
	let id = parse_id(text)?;
	let (folders, index) = image_position(&id)?;
	let parent = descend(root, folders)?;
	let tileset: &dyn Tileset = parent.as_deref().unwrap_or(root);
	let entry = tileset
		.entries()
		.get(index)
		.cloned()
		.ok_or_else(|| anyhow!("no entry {index}"))?;
	Ok(tileset.open_image(&entry)?)
}

fn extract_tile(root: &dyn Tileset, id: &str, dest: Option<&str>) -> anyhow::Result<String> {
	let mut img = open_image_at(root, id)?;
	let pixels = img.decode()?;
	let path = dest.map_or_else(|| format!("{}.bin", id.replace(['.', '+'], "_")), str::to_string);
	std::fs::write(&path, &pixels)?;
	Ok(path)
}

fn print_tile(root: &dyn Tileset, id: &str, wrap: u32) -> anyhow::Result<()> {
	let mut img = open_image_at(root, id)?;
	let dims = img.dimensions();
	let pixels = img.decode()?;
	let mask = img.decode_mask()?;
	let pal = img.palette().unwrap_or_else(|| default_palette_for(img.colour_depth()));

	if dims.area() == 0 {
		return Ok(());
	}
	// Wide images can be folded into bands of `wrap` columns.
	let wrap = if wrap == 0 { dims.x } else { wrap };
	for band in 0..dims.x.div_ceil(wrap) {
		for y in 0..dims.y as usize {
			for x in band * wrap..((band + 1) * wrap).min(dims.x) {
				let i = y * dims.x as usize + x as usize;
				if mask[i] & Mask::TRANSPARENT.bits() != 0 {
					print!("\x1b[0m  ");
					continue;
				}
				let c = pal.get(pixels[i]).unwrap_or(Rgba::rgb(0, 0, 0));
				print!("\x1b[48;2;{};{};{}m  ", c.r, c.g, c.b);
			}
			println!("\x1b[0m");
		}
	}
	Ok(())
}

fn set_size(root: &mut dyn Tileset, text: &str, dims: Point) -> anyhow::Result<()> {
	let id = parse_id(text)?;
	if id.image.is_some() {
		// An individual tile.
		let mut img = open_image_at(root, text)?;
		if !img.caps().contains(ImageCaps::SET_DIMENSIONS) {
			return Err(anyhow!("{text} is a fixed-size image"));
		}
		img.set_dimensions(dims)?;
	} else if id.folders.is_empty() {
		if !root.caps().contains(TilesetCaps::CHANGE_DIMENSIONS) {
			return Err(anyhow!("this tileset has no common tile size to change"));
		}
		root.set_dimensions(dims)?;
	} else {
		// A sub-tileset: resize all its tiles at once.
		let mut sub = descend(root, &id.folders)?.expect("non-empty path");
		if !sub.caps().contains(TilesetCaps::CHANGE_DIMENSIONS) {
			return Err(anyhow!("{text} has no common tile size to change"));
		}
		sub.set_dimensions(dims)?;
	}
	Ok(())
}

fn insert_image(root: &mut dyn Tileset, text: &str) -> anyhow::Result<()> {
	let id = parse_id(text)?;
	let (folders, index) = image_position(&id)?;
	match descend(root, folders)? {
		Some(mut parent) => {
			let before = parent.entries().get(index).cloned();
			parent.insert(before.as_ref(), Attributes::empty())?;
			parent.flush()?;
		}
		None => {
			let before = root.entries().get(index).cloned();
			root.insert(before.as_ref(), Attributes::empty())?;
		}
	}
	Ok(())
}
