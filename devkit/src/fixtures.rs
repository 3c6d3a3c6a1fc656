/*!
Sorties console réelles de `status` et `stats` par jeu

Capturées sur des serveurs dédiés, utilisées par les tests du parser et
par le mock RCON.
*/

use crate::rcon_stub::MockBehavior;

pub const CSGO_STATUS: &str = "hostname: Counter-Strike: Global Offensive
version : 1.38.0.1/13801 1231/8012 secure  [G:1:2468195]
udp/ip  : 0.0.0.0:27015  (public ip: 203.0.113.7)
os      :  Linux
type    :  community dedicated
map     : de_dust2
gotv[0]:  port 27020, delay 30.0s, rate 32.0
players : 3 humans, 2 bots (16/0 max) (not hibernating)

# userid name uniqueid connected ping loss state rate adr
#  2 1 \"GOTV\" BOT active 32
# 3 2 \"Alice\" STEAM_1:0:12345 05:12 40 0 active 196608 198.51.100.4:27005
#end
";

pub const CSGO_STATS: &str = "  CPU   NetIn   NetOut    Uptime  Maps   FPS   Players  Svms    +-ms   ~tick
 10.0  1234.5   9876.5       312     2  127.96       3    0.41    0.06    0.04
";

pub const TF2_STATUS: &str = "hostname: Valve Matchmaking Server (Virginia srcds1024-iad1 #42)
version : 7818773/24 7818773 secure
udp/ip  : 0.0.0.0:27015  (public ip: 203.0.113.8)
steamid : [A:1:123456789:12345] (90123456789012345)
account : not logged in  (No account specified)
map     : ctf_2fort at: 0 x, 0 y, 0 z
tags    : cp,increased_maxplayers
players : 24 humans, 0 bots (32 max)
edicts  : 1024 used of 2048 max
# userid name                uniqueid            connected ping loss state  adr
";

pub const TF2_STATS: &str = "CPU    In_(KB/s)  Out_(KB/s)  Uptime  Map_changes  FPS      Players  Connects
24.08  35.29      54.12       6       0            66.67    24       31
";

pub const GMOD_STATUS: &str = "hostname: Garry's Mod Sandbox
version : 2020.10.14/24 7812 secure
udp/ip  : 192.0.2.10:27015  (public ip: 192.0.2.10)
map     : gm_construct at: 0 x, 0 y, 0 z
players : 7 (24 max)

# userid name                uniqueid            connected ping loss state  adr
";

pub const GMOD_STATS: &str = "CPU   In    Out   Uptime  Users   FPS    Players
12.00 8.10  40.22 95      7       66.60  7
";

/// Pas de ligne vide avant la table des joueurs
pub const FOF_STATUS: &str = "hostname: Fistful of Frags Saloon
version : 1.0.0.0/24 8012 secure
udp/ip  : 0.0.0.0:27015
map     : fof_fistful at: 0 x, 0 y, 0 z
players : 2 (20 max)
# userid name uniqueid connected ping loss state adr
# 4 \"Stranger\" STEAM_0:1:42 10:00 60 0 active 198.51.100.9:27005
";

pub const FOF_STATS: &str = "CPU   In    Out   Uptime  Users   FPS    Players
3.20  1.00  2.00  600     2       66.00  2
";

/// Mock configuré pour un jeu donné
pub fn mock_for(status: &str, stats: &str) -> MockBehavior {
    MockBehavior::default()
        .with_response("status", status)
        .with_response("stats", stats)
}

pub fn csgo_server() -> MockBehavior {
    mock_for(CSGO_STATUS, CSGO_STATS)
}

pub fn tf2_server() -> MockBehavior {
    mock_for(TF2_STATUS, TF2_STATS)
}

pub fn gmod_server() -> MockBehavior {
    mock_for(GMOD_STATUS, GMOD_STATS)
}

pub fn fof_server() -> MockBehavior {
    mock_for(FOF_STATUS, FOF_STATS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use srcds_exporter::models::{MetricMapping, MetricValue};
    use srcds_exporter::parser::parse_query;

    fn parsed(status: &str, stats: &str) -> MetricMapping {
        let mut mapping = MetricMapping::new();
        parse_query(status, stats, &mut mapping).unwrap();
        mapping
    }

    #[test]
    fn test_csgo_sample() {
        let m = parsed(CSGO_STATUS, CSGO_STATS);
        assert_eq!(m.get("players"), Some(&MetricValue::Integer(3)));
        assert_eq!(m.get("bots"), Some(&MetricValue::Integer(2)));
        assert_eq!(m.get("max_players"), Some(&MetricValue::Integer(16)));
        assert_eq!(m.get("vartick"), Some(&MetricValue::Float(0.04)));
        assert_eq!(
            m.get("hostname"),
            Some(&MetricValue::Text("Counter-Strike: Global Offensive".into()))
        );
    }

    #[test]
    fn test_tf2_sample() {
        let m = parsed(TF2_STATUS, TF2_STATS);
        assert_eq!(m.get("NetIn"), Some(&MetricValue::Float(35.29)));
        assert_eq!(m.get("Maps"), Some(&MetricValue::Float(0.0)));
        assert_eq!(m.get("max_players"), Some(&MetricValue::Integer(32)));
    }

    #[test]
    fn test_gmod_and_fof_samples() {
        let gmod = parsed(GMOD_STATUS, GMOD_STATS);
        assert_eq!(gmod.get("players"), Some(&MetricValue::Integer(7)));
        assert!(!gmod.contains("bots"));

        let fof = parsed(FOF_STATUS, FOF_STATS);
        assert_eq!(fof.get("max_players"), Some(&MetricValue::Integer(20)));
        assert_eq!(fof.get("NetOut"), Some(&MetricValue::Float(2.0)));
    }
}
