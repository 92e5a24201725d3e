use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::info;

use crate::app::Vec2;
use crate::AppPaths;

use super::database::{
    ArenaDef, DefDatabase, DensityRounding, HostileDef, InteractableDef, ObstacleDef, RefillDef,
    SpawnRuleDef, YieldEntryDef,
};
use super::discovery::discover_mod_sources;
use super::types::{ContentPlanError, ContentPlanRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
enum CompiledDef {
    Interactable(InteractableDef),
    Hostile(HostileDef),
    SpawnRule(SpawnRuleDef),
    Arena(ArenaDef),
}

impl CompiledDef {
    fn def_type(&self) -> &'static str {
        match self {
            Self::Interactable(_) => "InteractableDef",
            Self::Hostile(_) => "HostileDef",
            Self::SpawnRule(_) => "SpawnRuleDef",
            Self::Arena(_) => "ArenaDef",
        }
    }

    fn def_name(&self) -> &str {
        match self {
            Self::Interactable(def) => &def.def_name,
            Self::Hostile(def) => &def.def_name,
            Self::SpawnRule(def) => &def.def_name,
            Self::Arena(def) => &def.def_name,
        }
    }
}

/// Compiles base content plus enabled mods into one database.
///
/// Each mod may define a def name once per def type; the same name in a later
/// mod overrides the earlier definition.
pub fn compile_def_database(
    app_paths: &AppPaths,
    request: &ContentPlanRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut builder = DefDatabase::builder();
    let mut file_count = 0usize;

    for source in &sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut seen_in_mod = HashSet::<(&'static str, String)>::new();

        for xml_file in xml_files {
            file_count = file_count.saturating_add(1);
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let defs = parse_defs_document(&source.mod_id, &xml_file, &raw)?;
            for (def, location) in defs {
                if !seen_in_mod.insert((def.def_type(), def.def_name().to_string())) {
                    return Err(ContentCompileError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate {} '{}' in mod '{}'; each mod may define a defName only once",
                            def.def_type(),
                            def.def_name(),
                            source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: xml_file.clone(),
                        location: Some(location),
                    });
                }
                builder = match def {
                    CompiledDef::Interactable(def) => builder.interactable(def),
                    CompiledDef::Hostile(def) => builder.hostile(def),
                    CompiledDef::SpawnRule(def) => builder.spawn_rule(def),
                    CompiledDef::Arena(def) => builder.arena(def),
                };
            }
        }
    }

    let database = builder.build();
    info!(
        mods = sources.len(),
        files = file_count,
        interactables = database.interactables().len(),
        hostiles = database.hostiles().len(),
        spawn_rules = database.spawn_rules().len(),
        arenas = database.arenas().len(),
        "content_compiled"
    );
    Ok(database)
}

struct DefSource<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> DefSource<'a, 'input> {
    fn location_of(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location_of(node)),
        }
    }

    fn text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn parse<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
        requirement: &str,
        accept: impl Fn(&T) -> bool,
    ) -> Result<T, ContentCompileError> {
        let value = self.text(node, field_name)?;
        match value.parse::<T>() {
            Ok(parsed) if accept(&parsed) => Ok(parsed),
            _ => Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is invalid; expected {requirement}"),
                node,
            )),
        }
    }
}

/// Element children of one def (or list entry), consumed field by field.
/// Whatever is left at `finish` is an unknown field.
struct Fields<'a, 'input> {
    owner: &'static str,
    node: Node<'a, 'input>,
    entries: Vec<(String, Node<'a, 'input>)>,
}

impl<'a, 'input> Fields<'a, 'input> {
    fn collect(
        src: &DefSource<'_, '_>,
        owner: &'static str,
        node: Node<'a, 'input>,
    ) -> Result<Self, ContentCompileError> {
        let mut entries = Vec::<(String, Node<'a, 'input>)>::new();
        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name().to_string();
            if entries.iter().any(|(name, _)| *name == field_name) {
                return Err(src.error_at(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{field_name}> in <{owner}>"),
                    field,
                ));
            }
            entries.push((field_name, field));
        }
        Ok(Self {
            owner,
            node,
            entries,
        })
    }

    fn take(&mut self, name: &str) -> Option<Node<'a, 'input>> {
        let idx = self.entries.iter().position(|(field, _)| field == name)?;
        Some(self.entries.remove(idx).1)
    }

    fn required_text(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
    ) -> Result<String, ContentCompileError> {
        match self.take(name) {
            Some(node) => src.text(node, name),
            None => Err(self.missing(src, name)),
        }
    }

    fn optional_text(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
    ) -> Result<Option<String>, ContentCompileError> {
        self.take(name).map(|node| src.text(node, name)).transpose()
    }

    fn optional<T: FromStr>(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
        requirement: &str,
        accept: impl Fn(&T) -> bool,
    ) -> Result<Option<T>, ContentCompileError> {
        self.take(name)
            .map(|node| src.parse(node, name, requirement, accept))
            .transpose()
    }

    fn required<T: FromStr>(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
        requirement: &str,
        accept: impl Fn(&T) -> bool,
    ) -> Result<T, ContentCompileError> {
        match self.optional(src, name, requirement, accept)? {
            Some(value) => Ok(value),
            None => Err(self.missing(src, name)),
        }
    }

    fn optional_bool(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
    ) -> Result<Option<bool>, ContentCompileError> {
        self.optional(src, name, "true or false", |_: &bool| true)
    }

    fn optional_vec2(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
    ) -> Result<Option<Vec2>, ContentCompileError> {
        let Some(node) = self.take(name) else {
            return Ok(None);
        };
        let value = src.text(node, name)?;
        parse_vec2(&value).map(Some).ok_or_else(|| {
            src.error_at(
                ContentErrorCode::InvalidValue,
                format!("{name} '{value}' is invalid; expected two finite numbers as 'x,y'"),
                node,
            )
        })
    }

    fn required_vec2(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
    ) -> Result<Vec2, ContentCompileError> {
        match self.optional_vec2(src, name)? {
            Some(value) => Ok(value),
            None => Err(self.missing(src, name)),
        }
    }

    /// `<li>` children of a list field; an absent list is empty.
    fn list(
        &mut self,
        src: &DefSource<'_, '_>,
        name: &str,
    ) -> Result<Vec<Node<'a, 'input>>, ContentCompileError> {
        let Some(node) = self.take(name) else {
            return Ok(Vec::new());
        };
        let mut items = Vec::new();
        for child in node.children().filter(|child| child.is_element()) {
            if child.tag_name().name() != "li" {
                return Err(src.error_at(
                    ContentErrorCode::UnknownField,
                    format!(
                        "unexpected <{}> in list <{name}>; entries must be <li>",
                        child.tag_name().name()
                    ),
                    child,
                ));
            }
            items.push(child);
        }
        Ok(items)
    }

    fn missing(&self, src: &DefSource<'_, '_>, name: &str) -> ContentCompileError {
        src.error_at(
            ContentErrorCode::MissingField,
            format!("missing required field <{name}> in <{}>", self.owner),
            self.node,
        )
    }

    fn finish(self, src: &DefSource<'_, '_>) -> Result<(), ContentCompileError> {
        match self.entries.first() {
            Some((name, node)) => Err(src.error_at(
                ContentErrorCode::UnknownField,
                format!("unknown field <{name}> in <{}>", self.owner),
                *node,
            )),
            None => Ok(()),
        }
    }
}

const NON_NEGATIVE: &str = "a finite number >= 0";
const POSITIVE: &str = "a finite number > 0";

fn non_negative(value: &f32) -> bool {
    value.is_finite() && *value >= 0.0
}

fn positive(value: &f32) -> bool {
    value.is_finite() && *value > 0.0
}

fn any_u32(_: &u32) -> bool {
    true
}

fn parse_vec2(raw: &str) -> Option<Vec2> {
    let (x, y) = raw.split_once(',')?;
    let x = x.trim().parse::<f32>().ok()?;
    let y = y.trim().parse::<f32>().ok()?;
    let value = Vec2::new(x, y);
    value.is_finite().then_some(value)
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<(CompiledDef, SourceLocation)>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let src = DefSource {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(src.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        let def = match child.tag_name().name() {
            "InteractableDef" => CompiledDef::Interactable(parse_interactable_def(&src, child)?),
            "HostileDef" => CompiledDef::Hostile(parse_hostile_def(&src, child)?),
            "SpawnRuleDef" => CompiledDef::SpawnRule(parse_spawn_rule_def(&src, child)?),
            "ArenaDef" => CompiledDef::Arena(parse_arena_def(&src, child)?),
            other => {
                return Err(src.error_at(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected InteractableDef, HostileDef, SpawnRuleDef or ArenaDef"
                    ),
                    child,
                ))
            }
        };
        defs.push((def, src.location_of(child)));
    }

    Ok(defs)
}

fn parse_interactable_def(
    src: &DefSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<InteractableDef, ContentCompileError> {
    let mut fields = Fields::collect(src, "InteractableDef", node)?;
    let def_name = fields.required_text(src, "defName")?;
    let label = fields
        .optional_text(src, "label")?
        .unwrap_or_else(|| def_name.clone());
    let max_hp = fields.required(src, "maxHp", "an integer >= 1", |v: &u32| *v >= 1)?;
    let radius = fields.optional(src, "radius", POSITIVE, positive)?.unwrap_or(0.5);
    let yield_rolls = fields
        .optional(src, "yieldRolls", "an integer >= 0", any_u32)?
        .unwrap_or(1);

    let mut yields = Vec::new();
    for item in fields.list(src, "yields")? {
        let mut entry = Fields::collect(src, "li", item)?;
        let item_id = entry.required_text(src, "item")?;
        let min = entry
            .optional(src, "min", "an integer >= 0", any_u32)?
            .unwrap_or(1);
        let max = entry
            .optional(src, "max", "an integer >= 0", any_u32)?
            .unwrap_or(min);
        let weight = entry.optional(src, "weight", POSITIVE, positive)?.unwrap_or(1.0);
        entry.finish(src)?;
        if min > max {
            return Err(src.error_at(
                ContentErrorCode::InvalidValue,
                format!("yield '{item_id}' has min {min} greater than max {max}"),
                item,
            ));
        }
        yields.push(YieldEntryDef {
            item_id,
            min,
            max,
            weight,
        });
    }
    fields.finish(src)?;

    Ok(InteractableDef {
        def_name,
        label,
        max_hp,
        radius,
        yield_rolls,
        yields,
    })
}

fn parse_hostile_def(
    src: &DefSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<HostileDef, ContentCompileError> {
    let mut fields = Fields::collect(src, "HostileDef", node)?;
    let def_name = fields.required_text(src, "defName")?;
    let label = fields
        .optional_text(src, "label")?
        .unwrap_or_else(|| def_name.clone());
    let def = HostileDef {
        max_hp: fields.required(src, "maxHp", "an integer >= 1", |v: &u32| *v >= 1)?,
        radius: fields.optional(src, "radius", POSITIVE, positive)?.unwrap_or(0.4),
        sight_radius: fields
            .optional(src, "sightRadius", NON_NEGATIVE, non_negative)?
            .unwrap_or(8.0),
        move_speed: fields
            .optional(src, "moveSpeed", NON_NEGATIVE, non_negative)?
            .unwrap_or(2.0),
        stop_distance: fields
            .optional(src, "stopDistance", NON_NEGATIVE, non_negative)?
            .unwrap_or(0.75),
        attack_range: fields
            .optional(src, "attackRange", NON_NEGATIVE, non_negative)?
            .unwrap_or(1.0),
        attack_cooldown_seconds: fields
            .optional(src, "attackCooldownSeconds", NON_NEGATIVE, non_negative)?
            .unwrap_or(1.2),
        damage: fields
            .optional(src, "damage", "an integer >= 0", any_u32)?
            .unwrap_or(1),
        def_name,
        label,
    };
    fields.finish(src)?;
    Ok(def)
}

fn parse_spawn_rule_def(
    src: &DefSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<SpawnRuleDef, ContentCompileError> {
    let mut fields = Fields::collect(src, "SpawnRuleDef", node)?;
    let def_name = fields.required_text(src, "defName")?;
    let template = fields.required_text(src, "template")?;
    let count = "an integer >= 0";
    let initial_burst = fields.optional(src, "initialBurst", count, any_u32)?.unwrap_or(0);
    let daily_cap = fields.optional(src, "dailyCap", count, any_u32)?.unwrap_or(0);
    let max_alive = fields.optional(src, "maxAlive", count, any_u32)?.unwrap_or(0);
    let interval_seconds = fields
        .optional(src, "intervalSeconds", NON_NEGATIVE, non_negative)?
        .unwrap_or(0.0);
    let respawn = fields.optional_bool(src, "respawn")?.unwrap_or(false);

    let floor_node = fields.take("refillFloor");
    let batch_node = fields.take("refillBatch");
    let refill = match (floor_node, batch_node) {
        (Some(floor), batch) => Some(RefillDef {
            floor: src.parse(floor, "refillFloor", count, any_u32)?,
            batch: batch
                .map(|node| src.parse(node, "refillBatch", count, any_u32))
                .transpose()?
                .unwrap_or(1),
        }),
        (None, Some(batch)) => {
            return Err(src.error_at(
                ContentErrorCode::InvalidValue,
                "refillBatch requires refillFloor in <SpawnRuleDef>".to_string(),
                batch,
            ))
        }
        (None, None) => None,
    };
    fields.finish(src)?;

    Ok(SpawnRuleDef {
        def_name,
        template,
        initial_burst,
        daily_cap,
        max_alive,
        interval_seconds,
        respawn,
        refill,
    })
}

fn parse_arena_def(
    src: &DefSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<ArenaDef, ContentCompileError> {
    let mut fields = Fields::collect(src, "ArenaDef", node)?;
    let def_name = fields.required_text(src, "defName")?;
    let label = fields
        .optional_text(src, "label")?
        .unwrap_or_else(|| def_name.clone());
    let area_min = fields.required_vec2(src, "areaMin")?;
    let area_max = fields.required_vec2(src, "areaMax")?;
    let agent_start = fields
        .optional_vec2(src, "agentStart")?
        .unwrap_or_else(|| (area_min + area_max) * 0.5);
    let agent_move_speed = fields
        .optional(src, "agentMoveSpeed", NON_NEGATIVE, non_negative)?
        .unwrap_or(4.0);

    let mut spawn_rules = Vec::new();
    for item in fields.list(src, "spawnRules")? {
        spawn_rules.push(src.text(item, "li")?);
    }

    let mut obstacles = Vec::new();
    for item in fields.list(src, "obstacles")? {
        let mut entry = Fields::collect(src, "li", item)?;
        let center = entry.required_vec2(src, "center")?;
        let half_extents = entry.required_vec2(src, "halfExtents")?;
        entry.finish(src)?;
        if half_extents.x < 0.0 || half_extents.y < 0.0 {
            return Err(src.error_at(
                ContentErrorCode::InvalidValue,
                "obstacle halfExtents must be >= 0".to_string(),
                item,
            ));
        }
        obstacles.push(ObstacleDef {
            center,
            half_extents,
        });
    }

    let max_placement_tries = fields
        .optional(src, "maxPlacementTries", "an integer >= 1", |v: &u32| *v >= 1)?
        .unwrap_or(24);
    let min_distance_from_agent = fields
        .optional(src, "minDistanceFromAgent", NON_NEGATIVE, non_negative)?
        .unwrap_or(2.0);
    let footprint_radius = fields
        .optional(src, "footprintRadius", NON_NEGATIVE, non_negative)?
        .unwrap_or(0.25);
    let seconds_per_day = fields
        .optional(src, "secondsPerDay", POSITIVE, positive)?
        .unwrap_or(15.0);
    let despawn_on_day_end = fields.optional_bool(src, "despawnOnDayEnd")?.unwrap_or(true);
    let density_factor = fields
        .optional(src, "densityFactor", "a finite number >= 1", |v: &f32| {
            v.is_finite() && *v >= 1.0
        })?
        .unwrap_or(1.0);
    let density_rounding = match fields.take("densityRounding") {
        Some(node) => match src.text(node, "densityRounding")?.as_str() {
            "Ceil" => DensityRounding::Ceil,
            "Nearest" => DensityRounding::Nearest,
            other => {
                return Err(src.error_at(
                    ContentErrorCode::InvalidValue,
                    format!("invalid densityRounding '{other}'; allowed values: Ceil, Nearest"),
                    node,
                ))
            }
        },
        None => DensityRounding::Ceil,
    };
    let density_min = fields
        .optional(src, "densityMin", "an integer >= 0", any_u32)?
        .unwrap_or(1);
    fields.finish(src)?;

    Ok(ArenaDef {
        def_name,
        label,
        area_min,
        area_max,
        agent_start,
        agent_move_speed,
        spawn_rules,
        obstacles,
        max_placement_tries,
        min_distance_from_agent,
        footprint_radius,
        seconds_per_day,
        despawn_on_day_end,
        density_factor,
        density_rounding,
        density_min,
    })
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentPlanError, root: &Path) -> ContentCompileError {
    match error {
        ContentPlanError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check DAYVIVE_ENABLED_MODS",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}
