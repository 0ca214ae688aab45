mod alarms;
mod ring_sessions;
