use anyhow::{anyhow, Result};
use chime_core::{
    AlarmDefinition, AlarmId, IntentRef, NotificationChannel, NotificationConfig,
    NotificationSpec, NotificationTarget, TargetKind, TimeOfDay, WeekDay, WeekDaySet, Zone,
};
use chime_scheduler::{AlarmClient, AlarmRequest, AlarmUpdate};
use chrono::DateTime;
use clap::Args;

#[derive(Args, Debug)]
pub struct TimeArgs {
    #[arg(long)]
    pub hour: u8,
    #[arg(long)]
    pub minute: u8,
    #[arg(long, default_value_t = 0)]
    pub second: u8,
    #[arg(long, default_value_t = 0)]
    pub millis: u16,
    /// Recurrence days: "mon,wed,fri", "weekdays", "weekend" or "daily".
    /// Omit for a one-shot alarm.
    #[arg(long, value_parser = parse_days)]
    pub days: Option<WeekDaySet>,
}

impl TimeArgs {
    fn time(&self) -> TimeOfDay {
        TimeOfDay::new(self.hour, self.minute, self.second, self.millis)
    }
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub time: TimeArgs,
    /// Use this id instead of a generated one
    #[arg(long)]
    pub id: Option<AlarmId>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub message: Option<String>,
    /// Screen opened when the notification is tapped, as package/Component
    #[arg(long, value_parser = parse_target)]
    pub open: Option<NotificationTarget>,
    /// Free-form metadata, repeatable: --meta label=gym
    #[arg(long = "meta", value_parser = parse_pair)]
    pub metadata: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: AlarmId,
    #[arg(long)]
    pub hour: Option<u8>,
    #[arg(long)]
    pub minute: Option<u8>,
    #[arg(long)]
    pub second: Option<u8>,
    #[arg(long)]
    pub millis: Option<u16>,
    /// New recurrence days; "once" makes the alarm one-shot
    #[arg(long, value_parser = parse_days)]
    pub days: Option<WeekDaySet>,
    #[arg(long)]
    pub active: Option<bool>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub message: Option<String>,
    /// Re-arm the alarm after storing the change
    #[arg(long)]
    pub renew: bool,
}

pub async fn set(client: &AlarmClient, args: SetArgs, zone: Zone) -> Result<()> {
    let time = args.time.time();
    let mut request = AlarmRequest::new(time.hour, time.minute)
        .second(time.second)
        .millis(time.millis)
        .weekdays(args.time.days.unwrap_or_default());
    if let Some(id) = args.id {
        request = request.id(id);
    }
    for (k, v) in args.metadata {
        request = request.metadata(k, v);
    }
    if let Some(config) = notification(args.title, args.message, args.open) {
        request = request.notification(config);
    }

    let id = client.set(request).await?;
    let def = client
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("alarm {id} vanished after set"))?;
    println!("{}", describe(&def, zone));
    Ok(())
}

pub async fn list(client: &AlarmClient, json: bool, zone: Zone) -> Result<()> {
    if json {
        println!("{}", client.list_json().await?);
        return Ok(());
    }
    let defs = client.list().await?;
    if defs.is_empty() {
        println!("no alarms");
    }
    for def in defs {
        println!("{}", describe(&def, zone));
    }
    Ok(())
}

pub async fn update(client: &AlarmClient, args: UpdateArgs, zone: Zone) -> Result<()> {
    let current = client
        .get(args.id)
        .await?
        .ok_or_else(|| anyhow!("no alarm with id {}", args.id))?;

    let mut change = AlarmUpdate::new(args.id);
    let old = current.time_of_day();
    if args.hour.is_some() || args.minute.is_some() || args.second.is_some() || args.millis.is_some()
    {
        change = change.time(
            TimeOfDay::new(
                args.hour.unwrap_or(old.hour),
                args.minute.unwrap_or(old.minute),
                args.second.unwrap_or(old.second),
                args.millis.unwrap_or(old.millis),
            )
            .validate()?,
        );
    }
    if let Some(days) = args.days {
        change = change.weekdays(days);
    }
    if let Some(active) = args.active {
        change = change.active(active);
    }
    if args.title.is_some() || args.message.is_some() {
        let mut config = current.notification_config.clone().unwrap_or_default();
        let mut notice = config.notification.take().unwrap_or_default();
        if let Some(title) = args.title {
            notice = notice.with_title(title);
        }
        if let Some(message) = args.message {
            notice = notice.with_message(message);
        }
        config.notification = Some(notice);
        config.channel.get_or_insert_with(NotificationChannel::default);
        change = change.notification(config);
    }

    let mut def = client.update(change).await?;
    if args.renew {
        client.renew(def.id).await?;
        def = client.get(def.id).await?.unwrap_or(def);
    } else {
        println!("stored, not re-armed (pass --renew to re-arm)");
    }
    println!("{}", describe(&def, zone));
    Ok(())
}

pub async fn cancel(client: &AlarmClient, id: AlarmId) -> Result<()> {
    client.disarm(id).await?;
    println!("alarm {id} disarmed");
    Ok(())
}

pub async fn delete(client: &AlarmClient, id: AlarmId) -> Result<()> {
    client.cancel(id).await?;
    println!("alarm {id} deleted");
    Ok(())
}

pub async fn tap(client: &AlarmClient, id: AlarmId) -> Result<()> {
    if client.receiver().on_content_tapped(id).await? {
        println!("opened content target of alarm {id}");
    } else {
        println!("alarm {id} has no content target");
    }
    Ok(())
}

pub fn next(client: &AlarmClient, args: TimeArgs, zone: Zone) -> Result<()> {
    let weekdays = args.days.clone().unwrap_or_default();
    let at = client.next_trigger(args.time(), &weekdays)?;
    println!("{}", format_millis(at, zone));
    Ok(())
}

fn notification(
    title: Option<String>,
    message: Option<String>,
    open: Option<NotificationTarget>,
) -> Option<NotificationConfig> {
    if title.is_none() && message.is_none() && open.is_none() {
        return None;
    }
    let mut notice = NotificationSpec::default().with_auto_cancel(true);
    if let Some(title) = title {
        notice = notice.with_title(title);
    }
    if let Some(message) = message {
        notice = notice.with_message(message);
    }
    let config = NotificationConfig::new(NotificationChannel::default(), notice);
    Some(match open {
        Some(target) => config.with_content_target(target),
        None => config,
    })
}

fn describe(def: &AlarmDefinition, zone: Zone) -> String {
    let days = if def.is_one_shot() {
        "once".to_string()
    } else {
        def.weekdays
            .iter()
            .map(|d| &d.name()[..3])
            .collect::<Vec<_>>()
            .join(",")
    };
    let next = def
        .next_trigger_time
        .map(|ms| format_millis(ms, zone))
        .unwrap_or_else(|| "-".to_string());
    let state = if def.is_active { "active" } else { "inactive" };
    let mut line = format!(
        "{:>10}  {:02}:{:02}:{:02}.{:03}  {:<27}  {:<8}  next {}",
        def.id, def.hour, def.minute, def.second, def.millis, days, state, next
    );
    if !def.metadata.is_empty() {
        let pairs: Vec<String> = def.metadata.iter().map(|(k, v)| format!("{k}={v}")).collect();
        line.push_str(&format!("  [{}]", pairs.join(" ")));
    }
    line
}

fn format_millis(ms: i64, zone: Zone) -> String {
    const FMT: &str = "%a %Y-%m-%d %H:%M:%S%.3f %:z";
    let Some(utc) = DateTime::from_timestamp_millis(ms) else {
        return format!("{ms} ms");
    };
    match zone {
        Zone::Local => utc.with_timezone(&chrono::Local).format(FMT).to_string(),
        Zone::Named(tz) => utc.with_timezone(&tz).format(FMT).to_string(),
        Zone::Fixed(offset) => utc.with_timezone(&offset).format(FMT).to_string(),
    }
}

fn parse_days(s: &str) -> std::result::Result<WeekDaySet, String> {
    use WeekDay::*;
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "once" | "none" => Ok(WeekDaySet::one_shot()),
        "daily" | "every-day" | "all" => Ok(WeekDaySet::every_day()),
        "weekdays" => Ok(WeekDaySet::from([Monday, Tuesday, Wednesday, Thursday, Friday])),
        "weekend" => Ok(WeekDaySet::from([Saturday, Sunday])),
        _ => WeekDaySet::parse_list(s),
    }
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if k.trim().is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((k.trim().to_string(), v.to_string()))
}

fn parse_target(s: &str) -> std::result::Result<NotificationTarget, String> {
    let (package, component) = s
        .split_once('/')
        .ok_or_else(|| format!("expected package/Component, got {s:?}"))?;
    // "pkg/.Main" is shorthand for "pkg/pkg.Main"
    let component = match component.strip_prefix('.') {
        Some(rest) => format!("{package}.{rest}"),
        None => component.to_string(),
    };
    NotificationTarget::from_intent(TargetKind::Screen, &IntentRef::explicit(package, component))
        .map_err(|e| e.to_string())
}
