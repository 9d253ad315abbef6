use std::time::{Duration, Instant};

use super::posture::{distance, standing_ankle, PostureCriteria};
use super::session::{MeasurementSession, Mode, ScoreRecord};
use crate::config::MeasurerConfig;
use crate::error::StartRejected;
use crate::pipeline::FusedState;
use crate::pose::Pose;

/// Start stance seen at `armed_at`; measurement begins if it still holds
/// once the debounce window has passed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmedStance {
    pub armed_at: Instant,
    pub pose: Pose,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub from: Mode,
    pub to: Mode,
    /// Closed session to hand to the score store
    pub completed: Option<ScoreRecord>,
}

impl TickOutcome {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Balance-quality state machine.
///
/// Owns the single active session; all time comes in through `now` so
/// ticks are deterministic.
#[derive(Debug, Clone)]
pub struct BalanceStateMachine {
    criteria: PostureCriteria,
    normal: Duration,
    popup_timeout: Duration,
    debounce: Duration,
    auto_start: bool,
    mode: Mode,
    /// What the last tick presented; `NotDetected` never sticks in `mode`
    shown: Mode,
    session: Option<MeasurementSession>,
    armed: Option<ArmedStance>,
}

impl BalanceStateMachine {
    pub fn new(config: &MeasurerConfig) -> Self {
        Self {
            criteria: PostureCriteria::from_config(config),
            normal: config.normal(),
            popup_timeout: config.score_popup_timeout(),
            debounce: config.debounce(),
            auto_start: config.auto_start,
            mode: Mode::Idle,
            shown: Mode::Idle,
            session: None,
            armed: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// State reported by the last tick: `NotDetected` while nobody is
    /// visible, otherwise the same as `mode`.
    pub fn shown_mode(&self) -> Mode {
        self.shown
    }

    pub fn session(&self) -> Option<&MeasurementSession> {
        self.session.as_ref()
    }

    pub fn armed(&self) -> Option<&ArmedStance> {
        self.armed.as_ref()
    }

    pub fn normal_duration(&self) -> Duration {
        self.normal
    }

    /// Begin a measurement on request. Only allowed from `Idle` with a
    /// detected person in the fused result.
    pub fn start(
        &mut self,
        user_id: &str,
        fused: &FusedState,
        now: Instant,
    ) -> Result<(), StartRejected> {
        if self.mode != Mode::Idle {
            return Err(StartRejected::NotIdle(self.mode));
        }
        let pose = *fused.person().ok_or(StartRejected::NoDetection)?;
        self.begin_session(user_id, &pose, now);
        Ok(())
    }

    /// Drop any session and return to `Idle`
    pub fn reset(&mut self) {
        self.clear();
        self.mode = Mode::Idle;
        self.shown = Mode::Idle;
    }

    /// Advance one render tick
    pub fn tick(&mut self, now: Instant, fused: &FusedState) -> TickOutcome {
        let from = self.shown;
        let mut completed = None;

        match fused.person().copied() {
            // lost detection preempts every state, including a live measurement,
            // and falls straight back to Idle within the same tick
            None => {
                self.clear();
                self.mode = Mode::Idle;
                self.shown = Mode::NotDetected;
            }
            Some(pose) => {
                match self.mode {
                    Mode::Idle | Mode::NotDetected => self.evaluate_idle(now, &pose),
                    Mode::Measuring => self.evaluate_measuring(now, &pose),
                    Mode::Normal | Mode::Abnormal => completed = self.evaluate_finished(now),
                }
                self.shown = self.mode;
            }
        }

        TickOutcome {
            from,
            to: self.shown,
            completed,
        }
    }

    fn evaluate_idle(&mut self, now: Instant, pose: &Pose) {
        if !self.auto_start {
            return;
        }
        if !self.criteria.is_ready_stance(pose) {
            self.armed = None;
            return;
        }
        match self.armed {
            None => {
                self.armed = Some(ArmedStance {
                    armed_at: now,
                    pose: *pose,
                })
            }
            Some(armed) if now.saturating_duration_since(armed.armed_at) >= self.debounce => {
                // anchor comes from the pose seen when the stance was first held
                self.begin_session("", &armed.pose, now);
            }
            Some(_) => {}
        }
    }

    fn evaluate_measuring(&mut self, now: Instant, pose: &Pose) {
        let Some(session) = self.session.as_mut() else {
            self.mode = Mode::Idle;
            return;
        };

        session.elapsed = now.saturating_duration_since(session.started_at);
        session.score = score_for(session.elapsed, self.normal);
        if session.elapsed >= self.normal {
            session.finished_at = Some(now);
            self.mode = Mode::Normal;
        }

        // runs after the timeout check, so a same-tick drift still ends Abnormal
        let current = pose.get(session.anchor_joint).position();
        session.current_anchor = current;
        if distance(current, session.start_anchor) > session.deviation_threshold {
            session.finished_at = Some(now);
            self.mode = Mode::Abnormal;
        }
    }

    fn evaluate_finished(&mut self, now: Instant) -> Option<ScoreRecord> {
        let session = self.session.as_ref()?;
        let finished_at = session.finished_at.unwrap_or(now);
        if now.saturating_duration_since(finished_at) < self.popup_timeout {
            return None;
        }
        let record = ScoreRecord::from(session);
        self.reset();
        Some(record)
    }

    fn begin_session(&mut self, user_id: &str, pose: &Pose, now: Instant) {
        let anchor_joint = standing_ankle(pose);
        let start_anchor = pose.get(anchor_joint).position();
        let threshold = self.criteria.deviation_threshold(pose, start_anchor);
        let session = MeasurementSession::new(user_id, anchor_joint, start_anchor, threshold, now);
        self.session = Some(session);
        self.armed = None;
        self.mode = Mode::Measuring;
        self.shown = Mode::Measuring;
    }

    fn clear(&mut self) {
        self.session = None;
        self.armed = None;
    }
}

/// `floor(elapsed / normal * 100)`, in integer nanoseconds to avoid float truncation
fn score_for(elapsed: Duration, normal: Duration) -> u32 {
    let normal = normal.as_nanos().max(1);
    (elapsed.as_nanos() * 100 / normal).min(u32::MAX as u128) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::posture::fixtures::{resting_pose, stance_pose, with_joint};
    use crate::pipeline::KeypointsResult;
    use crate::pose::KeypointIndex;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn fused(at: Instant, pose: Option<Pose>) -> FusedState {
        FusedState {
            timestamp: at,
            result: Some(KeypointsResult::new(at, pose)),
        }
    }

    fn machine() -> BalanceStateMachine {
        BalanceStateMachine::new(&MeasurerConfig::default())
    }

    /// Machine already measuring, started at `t0` on the stance pose
    fn measuring(t0: Instant) -> BalanceStateMachine {
        let mut m = machine();
        m.start("user-1", &fused(t0, Some(stance_pose())), t0).unwrap();
        m
    }

    #[test]
    fn test_score_for_floors() {
        assert_eq!(score_for(ms(12_500), ms(25_000)), 50);
        assert_eq!(score_for(ms(3_000), ms(25_000)), 12);
        assert_eq!(score_for(ms(24_999), ms(25_000)), 99);
        assert_eq!(score_for(ms(25_000), ms(25_000)), 100);
    }

    #[test]
    fn test_starts_idle() {
        let m = machine();
        assert_eq!(m.mode(), Mode::Idle);
        assert!(m.session().is_none());
    }

    #[test]
    fn test_start_requires_detection() {
        let t0 = Instant::now();
        let mut m = machine();
        assert_eq!(m.start("u", &fused(t0, None), t0), Err(StartRejected::NoDetection));
        let empty = FusedState { timestamp: t0, result: None };
        assert_eq!(m.start("u", &empty, t0), Err(StartRejected::NoDetection));
        assert_eq!(m.mode(), Mode::Idle);
    }

    #[test]
    fn test_start_requires_idle() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        assert_eq!(
            m.start("other", &fused(t0, Some(stance_pose())), t0),
            Err(StartRejected::NotIdle(Mode::Measuring))
        );
        assert_eq!(m.session().unwrap().user_id, "user-1");
    }

    #[test]
    fn test_start_picks_standing_ankle() {
        let t0 = Instant::now();
        let pose = with_joint(
            with_joint(stance_pose(), KeypointIndex::LeftAnkle, 100.0, 400.0),
            KeypointIndex::RightAnkle,
            200.0,
            300.0,
        );
        let mut m = machine();
        m.start("u", &fused(t0, Some(pose)), t0).unwrap();
        let session = m.session().unwrap();
        assert_eq!(session.anchor_joint, KeypointIndex::LeftAnkle);
        assert_eq!(session.start_anchor, (100.0, 400.0));
        assert_eq!(m.mode(), Mode::Measuring);
    }

    #[test]
    fn test_debounce_cancelled_when_stance_breaks() {
        let t0 = Instant::now();
        let mut m = machine();
        for step in 0..=5 {
            let now = t0 + ms(step * 100);
            m.tick(now, &fused(now, Some(stance_pose())));
        }
        assert!(m.armed().is_some());

        let now = t0 + ms(600);
        m.tick(now, &fused(now, Some(resting_pose())));
        assert!(m.armed().is_none());

        for step in 7..=12 {
            let now = t0 + ms(step * 100);
            m.tick(now, &fused(now, Some(resting_pose())));
            assert_eq!(m.mode(), Mode::Idle);
        }
    }

    #[test]
    fn test_debounce_fires_once_after_hold() {
        let t0 = Instant::now();
        let mut m = machine();
        let mut starts = 0;
        for step in 0..=10 {
            let now = t0 + ms(step * 100);
            let outcome = m.tick(now, &fused(now, Some(stance_pose())));
            if outcome.from == Mode::Idle && outcome.to == Mode::Measuring {
                starts += 1;
                assert_eq!(now, t0 + ms(700));
            }
        }
        assert_eq!(starts, 1);
        assert_eq!(m.mode(), Mode::Measuring);
        assert_eq!(m.session().unwrap().started_at, t0 + ms(700));
        assert_eq!(m.session().unwrap().user_id, "");
    }

    #[test]
    fn test_debounce_uses_pose_from_arm_time() {
        let t0 = Instant::now();
        let mut m = machine();
        m.tick(t0, &fused(t0, Some(stance_pose())));
        let moved = with_joint(stance_pose(), KeypointIndex::LeftAnkle, 665.0, 622.0);
        let fire = t0 + ms(700);
        m.tick(fire, &fused(fire, Some(moved)));
        assert_eq!(m.session().unwrap().start_anchor, (660.0, 620.0));
    }

    #[test]
    fn test_auto_start_disabled() {
        let t0 = Instant::now();
        let mut config = MeasurerConfig::default();
        config.auto_start = false;
        let mut m = BalanceStateMachine::new(&config);
        for step in 0..20 {
            let now = t0 + ms(step * 100);
            m.tick(now, &fused(now, Some(stance_pose())));
        }
        assert_eq!(m.mode(), Mode::Idle);
    }

    #[test]
    fn test_score_midway() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let now = t0 + ms(12_500);
        m.tick(now, &fused(now, Some(stance_pose())));
        assert_eq!(m.mode(), Mode::Measuring);
        assert_eq!(m.session().unwrap().score, 50);
    }

    #[test]
    fn test_normal_fires_exactly_once() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let mut normal_transitions = 0;
        for now in [t0 + ms(24_900), t0 + ms(25_000), t0 + ms(25_100), t0 + ms(26_000)] {
            let outcome = m.tick(now, &fused(now, Some(stance_pose())));
            if outcome.changed() && outcome.to == Mode::Normal {
                normal_transitions += 1;
            }
        }
        assert_eq!(normal_transitions, 1);
        let session = m.session().unwrap();
        assert_eq!(session.score, 100);
        assert_eq!(session.finished_at, Some(t0 + ms(25_000)));
    }

    #[test]
    fn test_deviation_goes_abnormal() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let threshold = m.session().unwrap().deviation_threshold;
        let drifted =
            with_joint(stance_pose(), KeypointIndex::LeftAnkle, 660.0 + threshold + 1.0, 620.0);
        let now = t0 + ms(6_250);
        m.tick(now, &fused(now, Some(drifted)));
        assert_eq!(m.mode(), Mode::Abnormal);
        assert_eq!(m.session().unwrap().score, 25);
    }

    #[test]
    fn test_drift_within_threshold_keeps_measuring() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let threshold = m.session().unwrap().deviation_threshold;
        let drifted = with_joint(stance_pose(), KeypointIndex::LeftAnkle, 660.0 + threshold, 620.0);
        let now = t0 + ms(1_000);
        m.tick(now, &fused(now, Some(drifted)));
        assert_eq!(m.mode(), Mode::Measuring);
    }

    #[test]
    fn test_timeout_and_deviation_same_tick_is_abnormal() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let drifted = with_joint(stance_pose(), KeypointIndex::LeftAnkle, 900.0, 620.0);
        let now = t0 + ms(25_000);
        let outcome = m.tick(now, &fused(now, Some(drifted)));
        assert_eq!(outcome.to, Mode::Abnormal);
        assert_eq!(m.session().unwrap().score, 100);
    }

    #[test]
    fn test_popup_timeout_completes_session() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let end = t0 + ms(25_000);
        m.tick(end, &fused(end, Some(stance_pose())));
        assert_eq!(m.mode(), Mode::Normal);

        let early = end + ms(4_900);
        assert!(m.tick(early, &fused(early, Some(stance_pose()))).completed.is_none());
        assert_eq!(m.mode(), Mode::Normal);

        let done = end + ms(5_000);
        let outcome = m.tick(done, &fused(done, Some(stance_pose())));
        assert_eq!(outcome.to, Mode::Idle);
        let record = outcome.completed.unwrap();
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.score, 100);
        assert_eq!(record.elapsed, ms(25_000));
        assert!(m.session().is_none());
    }

    #[test]
    fn test_lost_detection_aborts_measurement() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        let now = t0 + ms(2_000);
        let outcome = m.tick(now, &fused(now, None));
        assert_eq!(outcome.to, Mode::NotDetected);
        assert_eq!(m.mode(), Mode::Idle);
        assert!(m.session().is_none());

        let next = now + ms(40);
        let outcome = m.tick(next, &fused(next, Some(resting_pose())));
        assert_eq!(outcome.from, Mode::NotDetected);
        assert_eq!(outcome.to, Mode::Idle);
    }

    #[test]
    fn test_not_detected_is_transient() {
        let t0 = Instant::now();
        let mut m = machine();
        for step in 0..3 {
            let now = t0 + ms(step * 40);
            let outcome = m.tick(now, &fused(now, None));
            assert_eq!(outcome.to, Mode::NotDetected);
            assert_eq!(m.shown_mode(), Mode::NotDetected);
            assert_eq!(m.mode(), Mode::Idle);
        }
        assert!(!m.tick(t0, &fused(t0, None)).changed());
    }

    #[test]
    fn test_start_with_nobody_visible_reports_no_detection() {
        let t0 = Instant::now();
        let mut m = machine();
        for step in 0..2 {
            let now = t0 + ms(step * 40);
            m.tick(now, &fused(now, None));
        }
        let now = t0 + ms(80);
        assert_eq!(m.start("u", &fused(now, None), now), Err(StartRejected::NoDetection));

        m.start("u", &fused(now, Some(stance_pose())), now).unwrap();
        assert_eq!(m.mode(), Mode::Measuring);
        assert_eq!(m.shown_mode(), Mode::Measuring);
    }

    #[test]
    fn test_reset_from_any_state() {
        let t0 = Instant::now();
        let mut m = measuring(t0);
        m.reset();
        assert_eq!(m.mode(), Mode::Idle);
        assert!(m.session().is_none());
        m.start("again", &fused(t0, Some(stance_pose())), t0).unwrap();
        assert_eq!(m.mode(), Mode::Measuring);
    }
}
