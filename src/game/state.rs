use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::catalog::{CardId, Faction, Polarity, Trait};
use super::procedural::{BriberyRider, DebuffKind};
use crate::config::EngineConfig;

/// 单位与事件单位共用的自增标识。
pub type UnitId = u32;

pub const BOARD_COLS: usize = 5;
/// 所有战线（以及事件行）共享的 Judge 列。
pub const JUDGE_COL: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Front,
    Back,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::Front, Lane::Back];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Pvp,
    Pve,
    Tutorial,
    Sandbox,
}

impl MatchMode {
    pub fn allows_random_events(self) -> bool {
        matches!(self, MatchMode::Pvp | MatchMode::Pve)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Mulligan,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Controller {
    Human,
    Bot { level: u8 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    LeaderDefeated,
    Verdict,
    Concession,
    MarketClose,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RandomEventKind {
    DividendCrate,
    MarketRally,
    FlashCrash,
    Audit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leader {
    pub hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub front: [Option<UnitId>; BOARD_COLS],
    pub back: [Option<UnitId>; BOARD_COLS],
}

impl Board {
    pub fn lane(&self, lane: Lane) -> &[Option<UnitId>; BOARD_COLS] {
        match lane {
            Lane::Front => &self.front,
            Lane::Back => &self.back,
        }
    }

    pub fn lane_mut(&mut self, lane: Lane) -> &mut [Option<UnitId>; BOARD_COLS] {
        match lane {
            Lane::Front => &mut self.front,
            Lane::Back => &mut self.back,
        }
    }

    pub fn slot(&self, lane: Lane, col: usize) -> Option<UnitId> {
        self.lane(lane).get(col).copied().flatten()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    pub faction: Faction,
    pub controller: Controller,
    pub shares: i32,
    pub favor: i32,
    pub probation: i32,
    pub leader: Leader,
    #[serde(default)]
    pub deck: Vec<CardId>,
    #[serde(default)]
    pub hand: Vec<CardId>,
    #[serde(default)]
    pub discard: Vec<CardId>,
    pub board: Board,
    pub naked_short_debt: i32,
    pub debt_turns: u32,
    pub judge_hostility: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_lane: Option<Lane>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_col: Option<usize>,
    pub mulligan_done: bool,
    pub fatigue: i32,
}

impl PlayerState {
    pub fn new(faction: Faction, controller: Controller, deck: Vec<CardId>, rules: &EngineConfig) -> Self {
        Self {
            faction,
            controller,
            shares: rules.starting_shares,
            favor: 0,
            probation: 0,
            leader: Leader {
                hp: rules.leader_hp,
                max_hp: rules.leader_hp,
            },
            deck,
            hand: Vec::new(),
            discard: Vec::new(),
            board: Board::default(),
            naked_short_debt: 0,
            debt_turns: 0,
            judge_hostility: 0,
            blocked_lane: None,
            blocked_col: None,
            mulligan_done: false,
            fatigue: 0,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.controller, Controller::Bot { .. })
    }

    pub fn gain_shares(&mut self, amount: i32) {
        self.shares = self.shares.saturating_add(amount.max(0));
    }

    /// 扣除至多 `amount`，返回实际扣除数。
    pub fn lose_shares(&mut self, amount: i32) -> i32 {
        let taken = amount.clamp(0, self.shares.max(0));
        self.shares -= taken;
        taken
    }

    pub fn adjust_favor(&mut self, delta: i32) {
        self.favor = (self.favor + delta).max(0);
    }

    pub fn adjust_probation(&mut self, delta: i32) {
        self.probation = (self.probation + delta).max(0);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitState {
    pub id: UnitId,
    pub owner: Side,
    pub card_id: CardId,
    pub attack: i32,
    pub base_attack: i32,
    pub health: i32,
    pub max_health: i32,
    pub lane: Lane,
    pub col: usize,
    #[serde(default)]
    pub traits: Vec<Trait>,
    pub cannot_attack_until_turn: u32,
    pub stunned_until_turn: u32,
    pub exposed_until_turn: u32,
    pub temp_attack_penalty: i32,
    pub temp_attack_penalty_until_turn: u32,
    pub shield_charges: u32,
}

impl UnitState {
    pub fn has_trait(&self, value: Trait) -> bool {
        self.traits.contains(&value)
    }

    pub fn polarity(&self) -> Option<Polarity> {
        if self.has_trait(Trait::JudgeGreen) {
            Some(Polarity::Green)
        } else if self.has_trait(Trait::JudgeBlue) {
            Some(Polarity::Blue)
        } else {
            None
        }
    }

    pub fn is_stunned(&self, turn: u32) -> bool {
        turn <= self.stunned_until_turn
    }

    pub fn is_exposed(&self, turn: u32) -> bool {
        turn <= self.exposed_until_turn
    }

    pub fn effective_attack(&self, turn: u32) -> i32 {
        let penalty = if turn <= self.temp_attack_penalty_until_turn {
            self.temp_attack_penalty
        } else {
            0
        };
        (self.attack - penalty).max(0)
    }

    pub fn is_ready(&self, turn: u32) -> bool {
        turn >= self.cannot_attack_until_turn && !self.is_stunned(turn)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Dividend { reward: i32 },
    IronCurtain { debtor: Side },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventUnitState {
    pub id: UnitId,
    pub kind: EventKind,
    pub health: i32,
    pub max_health: i32,
    pub col: usize,
}

/// 攻击或出牌所指向的对象。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRef {
    Leader { side: Side },
    Unit { unit_id: UnitId },
    Event { unit_id: UnitId },
    Judge,
}

/// 对局事件流，同时写入有界日志并随动作结果返回。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    MatchCreated { seed: u64, first_side: Side },
    MulliganApplied { side: Side, replaced: usize },
    MatchActivated { first_side: Side },
    TurnStarted { side: Side, turn: u32 },
    IncomeCollected { side: Side, amount: i32 },
    CardDrawn { side: Side, card_id: CardId },
    CardBurned { side: Side, card_id: CardId },
    FatigueDamage { side: Side, amount: i32 },
    CardPlayed { side: Side, card_id: CardId, cost: i32 },
    UnitSummoned { side: Side, unit_id: UnitId, card_id: CardId, lane: Lane, col: usize },
    UnitDisplaced { side: Side, unit_id: UnitId },
    AttackDeclared { side: Side, attacker_id: UnitId, target: TargetRef },
    LeaderDamaged { side: Side, amount: i32, hp: i32 },
    LeaderHealed { side: Side, amount: i32, hp: i32 },
    UnitDamaged { unit_id: UnitId, amount: i32, health: i32 },
    ShieldAbsorbed { unit_id: UnitId, charges_left: u32 },
    UnitHealed { unit_id: UnitId, amount: i32, health: i32 },
    UnitDestroyed { unit_id: UnitId, owner: Side, card_id: CardId, killer: Option<Side> },
    DebuffApplied { unit_id: UnitId, kind: DebuffKind, until_turn: u32 },
    DebuffResisted { unit_id: UnitId, kind: DebuffKind, chance_pct: u32 },
    UnitCleansed { unit_id: UnitId },
    AttackBuffed { unit_id: UnitId, amount: i32, attack: i32 },
    ShieldGained { unit_id: UnitId, charges: u32 },
    SharesGained { side: Side, amount: i32 },
    SharesLost { side: Side, amount: i32 },
    StandingChanged { side: Side, favor: i32, probation: i32, hostility: i32 },
    JudgeCaught { side: Side, card_id: CardId, chance_pct: u32, confiscated: i32 },
    CatchStun { unit_id: UnitId },
    JudgeInfluence { side: Side, polarity: Polarity, unit_id: UnitId },
    JudgeCombo { side: Side },
    JudgeFreeze { side: Side, lane: Lane },
    Petition { side: Side, success: bool },
    Bribe { side: Side, rider: BriberyRider },
    DebtTaken { side: Side, debt: i32 },
    DebtTick { side: Side, damage: i32, turns: u32 },
    DebtRepaid { side: Side, amount: i32, remaining: i32 },
    EventSpawned { unit_id: UnitId, kind: EventKind, col: usize },
    EventDamaged { unit_id: UnitId, amount: i32, health: i32 },
    EventCleared { unit_id: UnitId, killer: Option<Side> },
    RandomEvent { kind: RandomEventKind },
    UnitSeized { unit_id: UnitId, from: Side, to: Side },
    UnitRepositioned { unit_id: UnitId, lane: Lane, col: usize },
    MoodShifted { mood: i32 },
    MatchFinished { winner: Side, reason: FinishReason },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub turn: u32,
    pub event: GameEvent,
}

/// 对局内的有界环形日志，超出容量时丢弃最早的记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchLog {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<LogEntry>,
}

impl MatchLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, turn: u32, event: GameEvent) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            turn,
            event,
        });
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 历史上写入过的记录总数（包括已被淘汰的）。
    pub fn total_recorded(&self) -> u64 {
        self.next_seq
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Players {
    pub a: PlayerState,
    pub b: PlayerState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityError {
    SlotMismatch { unit_id: UnitId },
    OrphanSlot { side: Side, lane: Lane, col: usize },
    DuplicateSlot { unit_id: UnitId },
    EventRowMismatch { col: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchState {
    pub id: String,
    pub mode: MatchMode,
    pub status: MatchStatus,
    pub turn: u32,
    pub active_side: Side,
    pub seed: u64,
    pub rng_counter: u64,
    pub players: Players,
    #[serde(default)]
    pub units: BTreeMap<UnitId, UnitState>,
    #[serde(default)]
    pub event_units: BTreeMap<UnitId, EventUnitState>,
    pub event_row: [Option<UnitId>; BOARD_COLS],
    pub judge_mood: i32,
    pub log: MatchLog,
    pub rules: EngineConfig,
    pub next_unit_id: UnitId,
    pub revision: u64,
    pub updated_at: u64,
    pub turn_deadline_at: u64,
    pub mulligan_deadline_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl MatchState {
    pub fn record(&mut self, event: GameEvent) {
        let turn = self.turn;
        self.log.push(turn, event);
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn player(&self, side: Side) -> &PlayerState {
        match side {
            Side::A => &self.players.a,
            Side::B => &self.players.b,
        }
    }

    pub fn player_mut(&mut self, side: Side) -> &mut PlayerState {
        match side {
            Side::A => &mut self.players.a,
            Side::B => &mut self.players.b,
        }
    }

    pub fn unit(&self, unit_id: UnitId) -> Option<&UnitState> {
        self.units.get(&unit_id)
    }

    pub fn unit_mut(&mut self, unit_id: UnitId) -> Option<&mut UnitState> {
        self.units.get_mut(&unit_id)
    }

    pub fn slot(&self, side: Side, lane: Lane, col: usize) -> Option<UnitId> {
        self.player(side).board.slot(lane, col)
    }

    /// 一方的全部单位，按 (战线, 列) 顺序。
    pub fn units_of(&self, side: Side) -> Vec<UnitId> {
        let board = &self.player(side).board;
        Lane::ALL
            .iter()
            .flat_map(|lane| board.lane(*lane).iter().flatten().copied())
            .collect()
    }

    pub fn front_count(&self, side: Side) -> usize {
        self.player(side).board.front.iter().flatten().count()
    }

    pub fn taunt_units(&self, side: Side) -> Vec<UnitId> {
        self.units_of(side)
            .into_iter()
            .filter(|id| self.unit(*id).map(|unit| unit.has_trait(Trait::Taunt)).unwrap_or(false))
            .collect()
    }

    pub fn judge_slot(polarity: Polarity) -> (Lane, usize) {
        match polarity {
            Polarity::Blue => (Lane::Front, JUDGE_COL),
            Polarity::Green => (Lane::Back, JUDGE_COL),
        }
    }

    pub fn slot_polarity(lane: Lane, col: usize) -> Option<Polarity> {
        if col != JUDGE_COL {
            return None;
        }
        match lane {
            Lane::Front => Some(Polarity::Blue),
            Lane::Back => Some(Polarity::Green),
        }
    }

    pub fn judge_occupant(&self, side: Side, polarity: Polarity) -> Option<UnitId> {
        let (lane, col) = Self::judge_slot(polarity);
        self.slot(side, lane, col)
    }

    pub fn curtain_cols(&self, side: Side) -> Vec<usize> {
        self.event_units
            .values()
            .filter(|event| matches!(event.kind, EventKind::IronCurtain { debtor } if debtor == side))
            .map(|event| event.col)
            .collect()
    }

    pub fn empty_event_cols(&self) -> Vec<usize> {
        (0..BOARD_COLS)
            .filter(|col| *col != JUDGE_COL && self.event_row[*col].is_none())
            .collect()
    }

    /// 该位置是否因冻结或铁幕而不可用。
    pub fn is_denied(&self, side: Side, lane: Lane, col: usize) -> bool {
        let player = self.player(side);
        player.blocked_lane == Some(lane)
            || player.blocked_col == Some(col)
            || self.curtain_cols(side).contains(&col)
    }

    pub fn allocate_id(&mut self) -> UnitId {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        id
    }

    pub fn place_unit(&mut self, unit: UnitState) {
        let (side, lane, col, id) = (unit.owner, unit.lane, unit.col, unit.id);
        self.player_mut(side).board.lane_mut(lane)[col] = Some(id);
        self.units.insert(id, unit);
    }

    pub fn remove_unit(&mut self, unit_id: UnitId) -> Option<UnitState> {
        let unit = self.units.remove(&unit_id)?;
        let slot = &mut self.player_mut(unit.owner).board.lane_mut(unit.lane)[unit.col];
        if *slot == Some(unit_id) {
            *slot = None;
        }
        Some(unit)
    }

    pub fn spawn_event(&mut self, kind: EventKind, health: i32, col: usize) -> UnitId {
        let id = self.allocate_id();
        self.event_units.insert(
            id,
            EventUnitState {
                id,
                kind,
                health,
                max_health: health,
                col,
            },
        );
        self.event_row[col] = Some(id);
        id
    }

    pub fn remove_event(&mut self, unit_id: UnitId) -> Option<EventUnitState> {
        let event = self.event_units.remove(&unit_id)?;
        if self.event_row[event.col] == Some(unit_id) {
            self.event_row[event.col] = None;
        }
        Some(event)
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut seen = HashSet::new();
        for side in [Side::A, Side::B] {
            for lane in Lane::ALL {
                for (col, slot) in self.player(side).board.lane(lane).iter().enumerate() {
                    let Some(unit_id) = slot else { continue };
                    if !seen.insert(*unit_id) {
                        return Err(IntegrityError::DuplicateSlot { unit_id: *unit_id });
                    }
                    match self.unit(*unit_id) {
                        Some(unit) if unit.owner == side && unit.lane == lane && unit.col == col => {}
                        Some(_) => return Err(IntegrityError::SlotMismatch { unit_id: *unit_id }),
                        None => return Err(IntegrityError::OrphanSlot { side, lane, col }),
                    }
                }
            }
        }
        if let Some(unit_id) = self.units.keys().find(|id| !seen.contains(*id)) {
            return Err(IntegrityError::SlotMismatch { unit_id: *unit_id });
        }
        for (col, slot) in self.event_row.iter().enumerate() {
            let consistent = match slot {
                Some(id) => col != JUDGE_COL && self.event_units.get(id).map(|e| e.col) == Some(col),
                None => true,
            };
            if !consistent {
                return Err(IntegrityError::EventRowMismatch { col });
            }
        }
        Ok(())
    }
}
